//! # The Container
//!
//! Binds contracts to providers, validates every registration against the
//! current graph, and resolves instances on demand while honouring scopes.
//!
//! # Architecture
//! ```text
//! register ──> Validator ──> Registry / StrategyTable
//!
//! resolve ──> Registry ──> InstanceCache ──> factory or constructor
//!                               ▲                    │
//!                               └──── dependencies ──┘
//! ```
//!
//! # Examples
//! ```rust
//! use registrar_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) -> String { format!("[console] {msg}") }
//! }
//! impl Injectable for ConsoleLogger {
//!     fn descriptor() -> ProviderDescriptor<Self> {
//!         ProviderDescriptor::new()
//!             .constructor(|| ConsoleLogger)
//!             .implements::<dyn Logger>(|p| p)
//!     }
//! }
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct UserGreeter {
//!     logger: Arc<dyn Logger>,
//! }
//! impl Greeter for UserGreeter {
//!     fn greet(&self) -> String { self.logger.log("hello") }
//! }
//! impl Injectable for UserGreeter {
//!     fn descriptor() -> ProviderDescriptor<Self> {
//!         ProviderDescriptor::new()
//!             .constructor(|logger: Arc<dyn Logger>| UserGreeter { logger })
//!             .implements::<dyn Greeter>(|p| p)
//!     }
//! }
//!
//! let container = Container::new();
//! container.register::<dyn Logger, ConsoleLogger>(Scope::Singleton)?;
//! container.register::<dyn Greeter, UserGreeter>(Scope::Volatile)?;
//!
//! let greeter = container.resolve::<dyn Greeter>(Scope::Volatile)?;
//! assert_eq!(greeter.greet(), "[console] hello");
//! # Ok::<(), RegistrarError>(())
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::cache::InstanceCache;
use crate::error::Result;
use crate::graph::{Candidate, Validator};
use crate::key::{RegistrationKey, ServiceKey};
use crate::provider::{Activation, Injectable, Instance};
use crate::registry::{Registration, Registry};
use crate::resolver::Resolver;
use crate::scope::Scope;
use crate::settings::ContainerSettings;
use crate::strategy::{Strategy, StrategyChange, StrategyTable};

/// Registry and strategies change together, under one lock.
#[derive(Debug)]
struct State {
    registry: Registry,
    strategies: StrategyTable,
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Thread-safe service-resolution container.
///
/// Create one per application (or per test) and share it by reference.
pub struct Container {
    state: RwLock<State>,
    cache: InstanceCache,
    auto_resolve_overloaded_dependencies: AtomicBool,
}

impl Container {
    /// Creates an empty container with default settings.
    pub fn new() -> Self {
        Self::with_settings(ContainerSettings::default())
    }

    pub fn with_settings(settings: ContainerSettings) -> Self {
        Self {
            state: RwLock::new(State {
                registry: Registry::new(),
                strategies: StrategyTable::new(),
            }),
            cache: InstanceCache::new(),
            auto_resolve_overloaded_dependencies: AtomicBool::new(
                settings.auto_resolve_overloaded_dependencies,
            ),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> ContainerSettings {
        ContainerSettings {
            auto_resolve_overloaded_dependencies: self.auto_resolve_overloaded_dependencies(),
        }
    }

    /// Whether dependencies with several providers are accepted at registration.
    pub fn auto_resolve_overloaded_dependencies(&self) -> bool {
        self.auto_resolve_overloaded_dependencies.load(Ordering::Acquire)
    }

    /// Changes the overload policy for registrations made from now on.
    pub fn set_auto_resolve_overloaded_dependencies(&self, enabled: bool) {
        self.auto_resolve_overloaded_dependencies
            .store(enabled, Ordering::Release);
        debug!(enabled, "Overload policy changed");
    }

    // ── Registration ──

    /// Registers provider `P` for contract `C`, built from its single constructor.
    ///
    /// The registration is validated against the current graph first; on
    /// failure nothing changes.
    ///
    /// # Errors
    /// Any of the registration-time errors, see
    /// [`RegistrarError`](crate::error::RegistrarError).
    #[instrument(skip(self), fields(contract = type_name::<C>(), provider = type_name::<P>()))]
    pub fn register<C, P>(&self, scope: Scope) -> Result<()>
    where
        C: ?Sized + Send + Sync + 'static,
        P: Injectable,
    {
        let key = RegistrationKey::of::<C, P>();
        let descriptor = P::descriptor();

        let dependencies = match descriptor.constructors() {
            [single] => single.dependencies(),
            _ => &[],
        };

        let candidate = Candidate {
            key,
            scope,
            assignable: descriptor.is_assignable_to::<C>(),
            constructors: descriptor.constructors().len(),
            dependencies,
        };

        let mut state = self.state.write();
        Validator::new(&state.registry, self.auto_resolve_overloaded_dependencies())
            .validate(&candidate)?;

        let activation = Activation::new::<C, P>(&descriptor)?;
        state.registry.register(Registration {
            key,
            scope,
            activation: Arc::new(activation),
        });

        Ok(())
    }

    /// Registers `factory` to build provider `P` whenever contract `C`
    /// resolves to it.
    ///
    /// Constructor and dependency checks are skipped; the factory is
    /// responsible for producing the instance. If the pair is already
    /// registered its scope is kept.
    ///
    /// # Errors
    /// - [`RegistrarError::UnassignableProvider`](crate::error::RegistrarError::UnassignableProvider)
    /// - [`RegistrarError::NonOverwritableStrategy`](crate::error::RegistrarError::NonOverwritableStrategy)
    ///   when a factory exists and `overwrite_existing` is false
    #[instrument(skip(self, factory), fields(contract = type_name::<C>(), provider = type_name::<P>()))]
    pub fn register_with_factory<C, P, F>(
        &self,
        factory: F,
        scope: Scope,
        overwrite_existing: bool,
    ) -> Result<()>
    where
        C: ?Sized + Send + Sync + 'static,
        P: Injectable,
        F: Fn(&Resolver<'_>) -> Result<P> + Send + Sync + 'static,
    {
        let key = RegistrationKey::of::<C, P>();
        let activation = Activation::new::<C, P>(&P::descriptor())
            .inspect_err(|err| warn!(error = %err, "Factory registration rejected"))?
            .factory_only();

        let strategy: Strategy = Arc::new(move |resolver: &Resolver<'_>| -> Result<Instance> {
            factory(resolver).map(|provider| Arc::new(provider) as Instance)
        });

        let mut state = self.state.write();
        let change = state
            .strategies
            .insert(key, strategy, overwrite_existing)
            .inspect_err(|err| warn!(error = %err, "Factory registration rejected"))?;

        state.registry.register(Registration {
            key,
            scope,
            activation: Arc::new(activation),
        });

        // Instances built by the replaced factory are stale.
        if change == StrategyChange::Replaced {
            self.cache.invalidate([key]);
        }

        Ok(())
    }

    // ── Resolution ──

    /// Resolves the first provider of `C` registered with a scope of at
    /// least `minimum_scope`.
    ///
    /// ```rust,ignore
    /// let repo: Arc<dyn Repository> = container.resolve(Scope::Volatile)?;
    /// ```
    #[instrument(skip(self), fields(contract = type_name::<C>()))]
    pub fn resolve<C>(&self, minimum_scope: Scope) -> Result<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        Resolver::new(self).resolve::<C>(minimum_scope)
    }

    /// Resolves exactly provider `P` registered for `C`.
    #[instrument(skip(self), fields(contract = type_name::<C>(), provider = type_name::<P>()))]
    pub fn resolve_explicit<C, P>(&self, minimum_scope: Scope) -> Result<Arc<P>>
    where
        C: ?Sized + Send + Sync + 'static,
        P: Send + Sync + 'static,
    {
        Resolver::new(self).resolve_explicit::<C, P>(minimum_scope)
    }

    // ── Queries ──

    /// Returns `true` if `C` has at least one provider.
    pub fn has_registration<C: ?Sized + 'static>(&self) -> bool {
        self.state.read().registry.has_contract(&ServiceKey::of::<C>())
    }

    /// Returns `true` if `P` is registered for `C`.
    pub fn has_provider<C: ?Sized + 'static, P: 'static>(&self) -> bool {
        self.state
            .read()
            .registry
            .has_registration(&RegistrationKey::of::<C, P>())
    }

    /// Number of (contract, provider) pairs.
    pub fn registered_count(&self) -> usize {
        self.state.read().registry.len()
    }

    /// Number of Managed and Singleton instances currently cached.
    pub fn cached_instance_count(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if an instance of `P` for `C` is currently cached.
    pub fn is_cached<C: ?Sized + 'static, P: 'static>(&self) -> bool {
        self.cache.get(&RegistrationKey::of::<C, P>()).is_some()
    }

    pub fn strategy_count(&self) -> usize {
        self.state.read().strategies.len()
    }

    /// Snapshot of every pair registered with [`Scope::Managed`].
    pub fn managed_registrations(&self) -> Vec<RegistrationKey> {
        self.state.read().registry.managed_registrations().collect()
    }

    /// Providers of `C` with their scopes, in registration order.
    pub fn registrations_for<C: ?Sized + 'static>(&self) -> Vec<(RegistrationKey, Scope)> {
        self.state
            .read()
            .registry
            .providers(&ServiceKey::of::<C>())
            .iter()
            .map(|r| (r.key, r.scope))
            .collect()
    }

    // ── Lifecycle ──

    /// Drops every cached Managed instance; the next resolution builds a new one.
    ///
    /// Singleton instances and all registrations are kept.
    pub fn recycle_managed(&self) {
        let managed = self.managed_registrations();
        let recycled = self.cache.invalidate(managed);
        info!(recycled, "Recycled managed instances");
    }

    /// Removes every registration, factory and cached instance.
    pub fn clear_all(&self) {
        let mut state = self.state.write();
        state.registry.clear();
        state.strategies.clear();
        self.cache.clear();
        info!("Container cleared");
    }

    // ── Internal (used by Resolver) ──

    pub(crate) fn select_best(&self, contract: &ServiceKey, minimum_scope: Scope) -> Result<Registration> {
        self.state
            .read()
            .registry
            .select_best(contract, minimum_scope)
            .cloned()
    }

    pub(crate) fn select_explicit(&self, key: &RegistrationKey, minimum_scope: Scope) -> Result<Registration> {
        self.state
            .read()
            .registry
            .select_explicit(key, minimum_scope)
            .cloned()
    }

    pub(crate) fn strategy(&self, key: &RegistrationKey) -> Option<Strategy> {
        self.state.read().strategies.get(key).cloned()
    }

    pub(crate) fn cache(&self) -> &InstanceCache {
        &self.cache
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Container")
            .field("registered", &state.registry.len())
            .field("strategies", &state.strategies.len())
            .field("cached", &self.cache.len())
            .field(
                "auto_resolve_overloaded_dependencies",
                &self.auto_resolve_overloaded_dependencies(),
            )
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::Container;
    pub use crate::error::{RegistrarError, Result};
    pub use crate::key::{RegistrationKey, ServiceKey};
    pub use crate::provider::{Injectable, ProviderDescriptor};
    pub use crate::resolver::Resolver;
    pub use crate::scope::Scope;
    pub use crate::settings::ContainerSettings;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
