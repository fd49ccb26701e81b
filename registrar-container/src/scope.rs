//! Instance lifetime scopes.
//!
//! Scopes determine how long a resolved instance is reused:
//! - [`Scope::Volatile`] — new instance every resolution
//! - [`Scope::Managed`] — reused until the container recycles managed instances
//! - [`Scope::Singleton`] — reused for the lifetime of the container
//!
//! # Ordering
//! `Volatile < Managed < Singleton`. A registration may only depend on
//! contracts that have at least one registration of the same or a
//! longer scope.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Defines the lifetime of instances produced for a registration.
///
/// # Examples
/// ```
/// use registrar_container::scope::Scope;
///
/// assert!(Scope::Singleton > Scope::Managed);
/// assert!(Scope::Managed > Scope::Volatile);
/// assert_eq!(Scope::default(), Scope::Volatile);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// A new instance is produced every time one is requested.
    ///
    /// Never cached.
    #[default]
    Volatile,

    /// One instance, reused until [`Container::recycle_managed`] runs.
    ///
    /// The next resolution after a recycle builds a fresh instance.
    ///
    /// [`Container::recycle_managed`]: crate::container::Container::recycle_managed
    Managed,

    /// One instance for the lifetime of the container.
    ///
    /// Only [`Container::clear_all`](crate::container::Container::clear_all)
    /// drops it.
    Singleton,
}

impl Scope {
    /// Every scope, shortest lifetime first.
    pub const ALL: [Scope; 3] = [Scope::Volatile, Scope::Managed, Scope::Singleton];

    /// Returns `true` if instances of this scope are cached.
    #[inline]
    pub fn is_cached(&self) -> bool {
        !matches!(self, Scope::Volatile)
    }

    /// Returns `true` if this scope is recycled by `recycle_managed`.
    #[inline]
    pub fn is_managed(&self) -> bool {
        matches!(self, Scope::Managed)
    }

    #[inline]
    fn ordering(&self) -> u8 {
        match self {
            Scope::Volatile => 0,
            Scope::Managed => 1,
            Scope::Singleton => 2,
        }
    }
}

impl PartialOrd for Scope {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scope {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordering().cmp(&other.ordering())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Volatile => write!(f, "Volatile"),
            Scope::Managed => write!(f, "Managed"),
            Scope::Singleton => write!(f, "Singleton"),
        }
    }
}
