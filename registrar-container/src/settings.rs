//! Container configuration.

use serde::{Deserialize, Serialize};

/// Settings a [`Container`](crate::container::Container) starts with.
///
/// Every field has a default, so hosts can load a partial table from any
/// serde format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Allows registering providers whose dependencies have more than one
    /// provider. The first suitable one, in registration order, is used.
    pub auto_resolve_overloaded_dependencies: bool,
}

impl ContainerSettings {
    pub fn auto_resolve_overloaded_dependencies(mut self, enabled: bool) -> Self {
        self.auto_resolve_overloaded_dependencies = enabled;
        self
    }
}
