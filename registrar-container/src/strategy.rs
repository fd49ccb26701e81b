//! Strategy table — user-supplied factories keyed by (contract, provider).
//!
//! A strategy replaces automatic construction for its pair. At most one
//! strategy exists per pair; replacing it needs explicit permission.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{RegistrarError, Result};
use crate::key::RegistrationKey;
use crate::provider::Instance;
use crate::resolver::Resolver;

/// A type-erased factory producing a provider instance.
///
/// The factory receives a [`Resolver`] so it can pull its own
/// collaborators from the same container.
pub type Strategy = Arc<dyn Fn(&Resolver<'_>) -> Result<Instance> + Send + Sync>;

/// Outcome of [`StrategyTable::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StrategyChange {
    Added,
    Replaced,
}

#[derive(Default)]
pub(crate) struct StrategyTable {
    strategies: HashMap<RegistrationKey, Strategy>,
}

impl StrategyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the strategy for `key`.
    ///
    /// # Errors
    /// Returns [`RegistrarError::NonOverwritableStrategy`] if a strategy
    /// already exists and `overwrite_existing` is false. The table is
    /// unchanged in that case.
    pub fn insert(
        &mut self,
        key: RegistrationKey,
        strategy: Strategy,
        overwrite_existing: bool,
    ) -> Result<StrategyChange> {
        if self.strategies.contains_key(&key) && !overwrite_existing {
            return Err(RegistrarError::NonOverwritableStrategy(key));
        }

        let change = match self.strategies.insert(key, strategy) {
            Some(_) => StrategyChange::Replaced,
            None => StrategyChange::Added,
        };
        debug!(key = %key, ?change, "Strategy set");
        Ok(change)
    }

    pub fn get(&self, key: &RegistrationKey) -> Option<&Strategy> {
        self.strategies.get(key)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn clear(&mut self) {
        self.strategies.clear();
    }
}

impl fmt::Debug for StrategyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.strategies.keys()).finish()
    }
}
