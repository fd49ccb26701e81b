//! Registration registry — maps each contract to its providers.
//!
//! Providers are kept in registration order per contract. Best-match
//! resolution and the overload policy both rely on that order, so it is
//! never left to hash-map iteration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use registrar_support::rendering::suggest_similar;
use tracing::{debug, trace};

use crate::error::{NotRegisteredError, RegistrarError, Result};
use crate::key::{RegistrationKey, ServiceKey};
use crate::provider::Activation;
use crate::scope::Scope;

const MAX_SUGGESTIONS: usize = 3;

/// A single (contract, provider) registration and its scope.
#[derive(Clone)]
pub(crate) struct Registration {
    pub key: RegistrationKey,
    pub scope: Scope,
    pub activation: Arc<Activation>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("dependencies", &self.activation.dependencies)
            .finish()
    }
}

/// Stores all registrations, grouped by contract.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    contracts: HashMap<ServiceKey, Vec<Registration>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `contract` has at least one provider.
    pub fn has_contract(&self, contract: &ServiceKey) -> bool {
        self.contracts.get(contract).is_some_and(|p| !p.is_empty())
    }

    pub fn has_registration(&self, key: &RegistrationKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &RegistrationKey) -> Option<&Registration> {
        self.providers(&key.contract)
            .iter()
            .find(|r| r.key.provider == key.provider)
    }

    /// Providers registered for `contract`, in registration order.
    pub fn providers(&self, contract: &ServiceKey) -> &[Registration] {
        self.contracts.get(contract).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Adds the registration unless its pair already exists.
    ///
    /// Returns `false` (and keeps the existing scope) for a known pair.
    pub fn register(&mut self, registration: Registration) -> bool {
        if self.has_registration(&registration.key) {
            trace!(key = %registration.key, "Registration already present");
            return false;
        }

        debug!(key = %registration.key, scope = %registration.scope, "Registered provider");
        self.contracts
            .entry(registration.key.contract)
            .or_default()
            .push(registration);
        true
    }

    /// Picks the first provider of `contract` whose scope is at least `minimum_scope`.
    ///
    /// # Errors
    /// - [`RegistrarError::TypeNotRegistered`] — `contract` has no providers
    /// - [`RegistrarError::NoSuitableScope`] — none meets `minimum_scope`
    pub fn select_best(&self, contract: &ServiceKey, minimum_scope: Scope) -> Result<&Registration> {
        if !self.has_contract(contract) {
            return Err(RegistrarError::TypeNotRegistered(NotRegisteredError {
                requested: *contract,
                required_by: None,
                suggestions: self.find_suggestions(contract),
            }));
        }

        self.first_suitable(contract, minimum_scope)
            .ok_or(RegistrarError::NoSuitableScope {
                contract: *contract,
                minimum_scope,
            })
    }

    /// Picks exactly the provider in `key`, checking it meets `minimum_scope`.
    ///
    /// # Errors
    /// - [`RegistrarError::TypeNotRegistered`] — the contract has no providers
    /// - [`RegistrarError::ExplicitProviderNotRegistered`] — the pair is unknown
    /// - [`RegistrarError::ExplicitProviderUnsuitable`] — its scope is too short
    pub fn select_explicit(&self, key: &RegistrationKey, minimum_scope: Scope) -> Result<&Registration> {
        if !self.has_contract(&key.contract) {
            return Err(RegistrarError::TypeNotRegistered(NotRegisteredError {
                requested: key.contract,
                required_by: None,
                suggestions: self.find_suggestions(&key.contract),
            }));
        }

        let registration = self
            .get(key)
            .ok_or(RegistrarError::ExplicitProviderNotRegistered(*key))?;

        if registration.scope < minimum_scope {
            return Err(RegistrarError::ExplicitProviderUnsuitable {
                key: *key,
                scope: registration.scope,
                minimum_scope,
            });
        }

        Ok(registration)
    }

    pub fn first_suitable(&self, contract: &ServiceKey, minimum_scope: Scope) -> Option<&Registration> {
        self.providers(contract)
            .iter()
            .find(|r| r.scope >= minimum_scope)
    }

    /// Total number of (contract, provider) pairs.
    pub fn len(&self) -> usize {
        self.contracts.values().map(Vec::len).sum()
    }

    /// Lazily yields every pair registered with [`Scope::Managed`].
    pub fn managed_registrations(&self) -> impl Iterator<Item = RegistrationKey> + '_ {
        self.contracts
            .values()
            .flatten()
            .filter(|r| r.scope.is_managed())
            .map(|r| r.key)
    }

    pub fn clear(&mut self) {
        self.contracts.clear();
    }

    fn find_suggestions(&self, contract: &ServiceKey) -> Vec<String> {
        let available: Vec<&str> = self
            .contracts
            .iter()
            .filter(|(_, providers)| !providers.is_empty())
            .map(|(key, _)| key.type_name())
            .collect();

        suggest_similar(contract.type_name(), &available, MAX_SUGGESTIONS)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::provider::{Contracted, Instance};

    trait Repository {}
    trait Repo {}
    struct SqlRepository;
    struct MemoryRepository;
    struct Reports;

    pub(crate) fn activation(dependencies: Vec<ServiceKey>) -> Arc<Activation> {
        Arc::new(Activation {
            dependencies,
            construct: None,
            cast: Arc::new(|instance: Instance| -> Result<Contracted> { Ok(Box::new(instance)) }),
        })
    }

    pub(crate) fn registration(key: RegistrationKey, scope: Scope, dependencies: Vec<ServiceKey>) -> Registration {
        Registration {
            key,
            scope,
            activation: activation(dependencies),
        }
    }

    fn sql() -> RegistrationKey {
        RegistrationKey::of::<dyn Repository, SqlRepository>()
    }

    fn memory() -> RegistrationKey {
        RegistrationKey::of::<dyn Repository, MemoryRepository>()
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = Registry::new();
        assert!(registry.register(registration(sql(), Scope::Singleton, vec![])));

        assert!(registry.has_contract(&ServiceKey::of::<dyn Repository>()));
        assert!(registry.has_registration(&sql()));
        assert!(!registry.has_registration(&memory()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_pair_keeps_first_scope() {
        let mut registry = Registry::new();
        registry.register(registration(sql(), Scope::Managed, vec![]));
        assert!(!registry.register(registration(sql(), Scope::Singleton, vec![])));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&sql()).map(|r| r.scope), Some(Scope::Managed));
    }

    #[test]
    fn best_match_follows_registration_order() {
        let mut registry = Registry::new();
        registry.register(registration(memory(), Scope::Volatile, vec![]));
        registry.register(registration(sql(), Scope::Singleton, vec![]));

        let contract = ServiceKey::of::<dyn Repository>();
        assert_eq!(registry.select_best(&contract, Scope::Volatile).unwrap().key, memory());
        assert_eq!(registry.select_best(&contract, Scope::Managed).unwrap().key, sql());
    }

    #[test]
    fn best_match_errors() {
        let mut registry = Registry::new();
        let contract = ServiceKey::of::<dyn Repository>();

        assert!(matches!(
            registry.select_best(&contract, Scope::Volatile),
            Err(RegistrarError::TypeNotRegistered(_))
        ));

        registry.register(registration(sql(), Scope::Volatile, vec![]));
        match registry.select_best(&contract, Scope::Singleton) {
            Err(RegistrarError::NoSuitableScope { minimum_scope, .. }) => {
                assert_eq!(minimum_scope, Scope::Singleton);
            }
            other => panic!("Expected NoSuitableScope, got: {other:?}"),
        }
    }

    #[test]
    fn explicit_selection_errors() {
        let mut registry = Registry::new();
        registry.register(registration(memory(), Scope::Volatile, vec![]));

        assert!(matches!(
            registry.select_explicit(&sql(), Scope::Volatile),
            Err(RegistrarError::ExplicitProviderNotRegistered(_))
        ));
        assert!(matches!(
            registry.select_explicit(&memory(), Scope::Managed),
            Err(RegistrarError::ExplicitProviderUnsuitable { scope: Scope::Volatile, .. })
        ));
        assert!(registry.select_explicit(&memory(), Scope::Volatile).is_ok());
    }

    #[test]
    fn managed_registrations_only() {
        let mut registry = Registry::new();
        registry.register(registration(sql(), Scope::Managed, vec![]));
        registry.register(registration(memory(), Scope::Singleton, vec![]));
        registry.register(registration(RegistrationKey::of::<Reports, Reports>(), Scope::Managed, vec![]));

        let managed: Vec<RegistrationKey> = registry.managed_registrations().collect();
        assert_eq!(managed.len(), 2);
        assert!(managed.contains(&sql()));
        assert!(!managed.contains(&memory()));
    }

    #[test]
    fn suggestions_for_unknown_contract() {
        let mut registry = Registry::new();
        registry.register(registration(sql(), Scope::Volatile, vec![]));

        match registry.select_best(&ServiceKey::of::<dyn Repo>(), Scope::Volatile) {
            Err(RegistrarError::TypeNotRegistered(err)) => {
                assert!(err.suggestions.iter().any(|s| s.contains("Repository")));
            }
            other => panic!("Expected TypeNotRegistered, got: {other:?}"),
        }
    }

    #[test]
    fn clear_empties_registry() {
        let mut registry = Registry::new();
        registry.register(registration(sql(), Scope::Volatile, vec![]));
        registry.clear();

        assert_eq!(registry.len(), 0);
        assert!(!registry.has_contract(&ServiceKey::of::<dyn Repository>()));
    }
}
