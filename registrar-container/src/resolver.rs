//! Resolution of instances from a [`Container`].
//!
//! A [`Resolver`] lives for one top-level `resolve` call and is handed to
//! every factory invoked along the way, so nested resolutions share one
//! resolution path. Re-entering a (contract, provider) pair already on the
//! path is reported as [`RegistrarError::CyclicDependency`] before any
//! cache slot is touched, which keeps a self-referential factory from
//! blocking on its own slot.

use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::container::Container;
use crate::error::{ChainLink, CyclicDependencyError, RegistrarError, Result};
use crate::key::{RegistrationKey, ServiceKey};
use crate::provider::{Arguments, Contracted, Instance};
use crate::registry::Registration;
use crate::scope::Scope;

/// Handle used to resolve instances, including from inside factories.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use registrar_container::prelude::*;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 { 42 }
/// }
/// impl Injectable for FixedClock {
///     fn descriptor() -> ProviderDescriptor<Self> {
///         ProviderDescriptor::new()
///             .constructor(|| FixedClock)
///             .implements::<dyn Clock>(|p| p)
///     }
/// }
///
/// struct Stamp(u64);
/// impl Injectable for Stamp {
///     fn descriptor() -> ProviderDescriptor<Self> {
///         ProviderDescriptor::new()
///     }
/// }
///
/// let container = Container::new();
/// container.register::<dyn Clock, FixedClock>(Scope::Singleton).unwrap();
/// container
///     .register_with_factory::<Stamp, Stamp, _>(
///         |resolver: &Resolver<'_>| {
///             let clock = resolver.resolve::<dyn Clock>(Scope::Volatile)?;
///             Ok(Stamp(clock.now()))
///         },
///         Scope::Volatile,
///         false,
///     )
///     .unwrap();
///
/// let stamp = container.resolve::<Stamp>(Scope::Volatile).unwrap();
/// assert_eq!(stamp.0, 42);
/// ```
pub struct Resolver<'a> {
    container: &'a Container,
    path: ResolutionPath,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(container: &'a Container) -> Self {
        Self {
            container,
            path: ResolutionPath::default(),
        }
    }

    /// Resolves the best-matching provider for contract `C`.
    ///
    /// # Errors
    /// - [`RegistrarError::TypeNotRegistered`]
    /// - [`RegistrarError::NoSuitableScope`]
    /// - [`RegistrarError::CyclicDependency`]
    /// - any error raised while constructing the instance
    pub fn resolve<C>(&self, minimum_scope: Scope) -> Result<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let contract = ServiceKey::of::<C>();
        let registration = self.container.select_best(&contract, minimum_scope)?;

        let contracted = self.resolve_registration(&registration)?;
        downcast_contract::<C>(contracted)
    }

    /// Resolves exactly provider `P` registered for contract `C`.
    ///
    /// # Errors
    /// - [`RegistrarError::TypeNotRegistered`]
    /// - [`RegistrarError::ExplicitProviderNotRegistered`]
    /// - [`RegistrarError::ExplicitProviderUnsuitable`]
    /// - any error raised while constructing the instance
    pub fn resolve_explicit<C, P>(&self, minimum_scope: Scope) -> Result<Arc<P>>
    where
        C: ?Sized + Send + Sync + 'static,
        P: Send + Sync + 'static,
    {
        let key = RegistrationKey::of::<C, P>();
        let registration = self.container.select_explicit(&key, minimum_scope)?;

        let instance = self.instance(&registration)?;
        instance.downcast::<P>().map_err(|_| {
            RegistrarError::construction::<P>(format!(
                "instance registered for {key} is not a {}",
                type_name::<P>()
            ))
        })
    }

    /// Number of registrations currently being resolved on this path.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    fn resolve_registration(&self, registration: &Registration) -> Result<Contracted> {
        let instance = self.instance(registration)?;
        (registration.activation.cast)(instance)
    }

    /// Returns the cached instance or builds a new one.
    fn instance(&self, registration: &Registration) -> Result<Instance> {
        let link = ChainLink {
            key: registration.key,
            scope: registration.scope,
        };
        let _guard = self.path.enter(link)?;

        if registration.scope.is_cached() {
            self.container
                .cache()
                .get_or_try_init(link, || self.activate(registration))
        } else {
            self.activate(registration)
        }
    }

    /// Runs the factory for the pair, or constructs the provider from its
    /// dependencies.
    fn activate(&self, registration: &Registration) -> Result<Instance> {
        let key = registration.key;

        if let Some(strategy) = self.container.strategy(&key) {
            trace!(key = %key, "Invoking factory");
            return strategy(self);
        }

        let construct = registration.activation.construct.as_ref().ok_or_else(|| {
            RegistrarError::ConstructionFailed {
                key: key.provider,
                source: "provider has no constructor and no factory is registered".into(),
            }
        })?;

        trace!(key = %key, dependencies = registration.activation.dependencies.len(), "Constructing");

        let values = registration
            .activation
            .dependencies
            .iter()
            .map(|dependency| self.resolve_dependency(registration, dependency))
            .collect::<Result<Vec<_>>>()?;

        construct(&mut Arguments::new(key.provider, values))
    }

    /// Dependencies resolve at the dependent's own scope, so a long-lived
    /// instance never captures a shorter-lived one.
    fn resolve_dependency(&self, parent: &Registration, dependency: &ServiceKey) -> Result<Contracted> {
        let registration = self
            .container
            .select_best(dependency, parent.scope)
            .map_err(|err| match err {
                RegistrarError::TypeNotRegistered(mut not_registered) => {
                    not_registered.required_by = Some(parent.key.provider);
                    RegistrarError::TypeNotRegistered(not_registered)
                }
                other => other,
            })?;

        self.resolve_registration(&registration)
    }
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("path", &self.path.links.borrow())
            .finish()
    }
}

fn downcast_contract<C: ?Sized + Send + Sync + 'static>(contracted: Contracted) -> Result<Arc<C>> {
    contracted.downcast::<Arc<C>>().map(|boxed| *boxed).map_err(|_| {
        RegistrarError::construction::<C>(format!("resolved value is not an Arc<{}>", type_name::<C>()))
    })
}

/// Pairs currently under construction, outermost first.
#[derive(Debug, Default)]
struct ResolutionPath {
    links: RefCell<Vec<ChainLink>>,
}

impl ResolutionPath {
    fn enter(&self, link: ChainLink) -> Result<PathGuard<'_>> {
        let mut links = self.links.borrow_mut();

        if let Some(start) = links.iter().position(|l| l.key == link.key) {
            let mut chain = links[start..].to_vec();
            chain.push(link);

            warn!(cycle = ?chain, "Cyclic dependency detected during resolution!");
            return Err(RegistrarError::CyclicDependency(CyclicDependencyError { chain }));
        }

        links.push(link);
        Ok(PathGuard { path: self })
    }

    fn len(&self) -> usize {
        self.links.borrow().len()
    }
}

/// Pops its link when the resolution step finishes, successfully or not.
struct PathGuard<'a> {
    path: &'a ResolutionPath,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.path.links.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Orders;
    struct Billing;

    fn link<T: 'static>(scope: Scope) -> ChainLink {
        ChainLink {
            key: RegistrationKey::of::<T, T>(),
            scope,
        }
    }

    #[test]
    fn guard_pops_on_drop() {
        let path = ResolutionPath::default();
        {
            let _orders = path.enter(link::<Orders>(Scope::Singleton)).unwrap();
            let _billing = path.enter(link::<Billing>(Scope::Singleton)).unwrap();
            assert_eq!(path.len(), 2);
        }
        assert_eq!(path.len(), 0);
    }

    #[test]
    fn reentering_a_pair_is_a_cycle() {
        let path = ResolutionPath::default();
        let _orders = path.enter(link::<Orders>(Scope::Managed)).unwrap();
        let _billing = path.enter(link::<Billing>(Scope::Managed)).unwrap();

        match path.enter(link::<Orders>(Scope::Managed)) {
            Err(RegistrarError::CyclicDependency(err)) => {
                let keys: Vec<RegistrationKey> = err.chain.iter().map(|l| l.key).collect();
                assert_eq!(
                    keys,
                    vec![
                        RegistrationKey::of::<Orders, Orders>(),
                        RegistrationKey::of::<Billing, Billing>(),
                        RegistrationKey::of::<Orders, Orders>(),
                    ]
                );
            }
            Err(other) => panic!("Expected CyclicDependency, got: {other:?}"),
            Ok(_) => panic!("Expected CyclicDependency, got a guard"),
        }

        // A failed enter leaves the path untouched.
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn sibling_visits_are_not_cycles() {
        let path = ResolutionPath::default();
        let _orders = path.enter(link::<Orders>(Scope::Volatile)).unwrap();

        drop(path.enter(link::<Billing>(Scope::Volatile)).unwrap());
        assert!(path.enter(link::<Billing>(Scope::Volatile)).is_ok());
    }
}
