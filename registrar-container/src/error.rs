//! Error types for registrar container operations.
//!
//! Every error names the contract and provider involved and, for
//! dependency errors, the scope the dependency has to satisfy, so the
//! fix is obvious without inspecting the container.

use std::fmt;

use registrar_support::rendering::{ChainEntry, render_chain, render_chain_vertical};

use crate::key::{RegistrationKey, ServiceKey};
use crate::scope::Scope;

/// Main error type for all registrar operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistrarError {
    /// The (contract, provider) pair is already registered.
    #[error(
        "{} is already registered to resolve {}\n  Hint: register a different provider type to overload {}",
        .0.contract, .0.provider, .0.contract
    )]
    DuplicateRegistration(RegistrationKey),

    /// The provider's descriptor does not declare the contract.
    #[error(
        "{} cannot be registered for {}: instances of {} are not assignable to {}\n  Hint: add `.implements::<{}>(..)` to the descriptor of {}",
        .0.provider, .0.contract, .0.provider, .0.contract, .0.contract, .0.provider
    )]
    UnassignableProvider(RegistrationKey),

    /// The provider declares more than one constructor.
    #[error(
        "{provider} defines {constructors} constructors, which is too ambiguous for automatic construction\n  Hint: keep a single constructor or register {provider} with a factory"
    )]
    AmbiguousConstructor {
        provider: ServiceKey,
        constructors: usize,
    },

    /// A constructor parameter is a primitive value type.
    #[error(
        "{} cannot be registered: it depends on the primitive type {}, which the container cannot resolve\n  Hint: register {} with a factory",
        .0.dependent.provider, .0.dependency, .0.dependent.provider
    )]
    PrimitiveDependency(DependencyError),

    /// A constructor parameter has no registration at all.
    #[error(
        "{} depends on {}, which is not registered\n  Hint: register {} with a scope of {} or longer first",
        .0.dependent.provider, .0.dependency, .0.dependency, .0.scope
    )]
    UnregisteredDependency(DependencyError),

    /// A constructor parameter has several providers and overloads are
    /// not resolved automatically.
    #[error(
        "{} depends on {}, which has {providers} providers registered\n  Hint: remove the extra registrations or enable auto_resolve_overloaded_dependencies",
        .error.dependent.provider, .error.dependency
    )]
    AmbiguousDependency {
        error: DependencyError,
        providers: usize,
    },

    /// Every registration of a constructor parameter is shorter-lived
    /// than the registration being added.
    #[error(
        "{} depends on {}, whose registrations all have a shorter lifetime than {}\n  Hint: register {} with a scope of {} or longer, or lower the scope of {}",
        .0.dependent.provider, .0.dependency, .0.scope, .0.dependency, .0.scope, .0.dependent.provider
    )]
    DependencyScopeTooShort(DependencyError),

    /// A dependency chain leads back to a registration already on it.
    #[error("{}", .0)]
    CyclicDependency(CyclicDependencyError),

    /// A factory is already set for the pair and overwriting was not requested.
    #[error(
        "{} already has a factory for {} which can't be overwritten\n  Hint: pass overwrite_existing = true to replace it",
        .0.provider, .0.contract
    )]
    NonOverwritableStrategy(RegistrationKey),

    /// The requested contract has no registrations.
    #[error("{}", .0)]
    TypeNotRegistered(NotRegisteredError),

    /// The contract is registered, but no registration meets the minimum scope.
    #[error(
        "{contract} is registered, but none of its providers are suitable for a minimum scope of {minimum_scope}"
    )]
    NoSuitableScope {
        contract: ServiceKey,
        minimum_scope: Scope,
    },

    /// The explicitly requested provider is not registered for the contract.
    #[error("{} is not registered to be resolved for {}", .0.provider, .0.contract)]
    ExplicitProviderNotRegistered(RegistrationKey),

    /// The explicitly requested provider is registered with a scope below the minimum.
    #[error(
        "{} is registered for {} as {scope}, which does not meet the minimum scope of {minimum_scope}",
        .key.provider, .key.contract
    )]
    ExplicitProviderUnsuitable {
        key: RegistrationKey,
        scope: Scope,
        minimum_scope: Scope,
    },

    /// A factory or constructor failed, or produced an unexpected type.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: ServiceKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl RegistrarError {
    /// Wraps any error raised while building `P`.
    pub fn construction<P: ?Sized + 'static>(
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        RegistrarError::ConstructionFailed {
            key: ServiceKey::of::<P>(),
            source: source.into(),
        }
    }
}

/// Context for registration-time dependency errors.
#[derive(Debug, Clone)]
pub struct DependencyError {
    /// The registration being added.
    pub dependent: RegistrationKey,
    /// The constructor parameter's contract.
    pub dependency: ServiceKey,
    /// The scope being registered, which the dependency must satisfy.
    pub scope: Scope,
}

/// Error when a requested contract has no registrations.
#[derive(Debug)]
pub struct NotRegisteredError {
    pub requested: ServiceKey,
    /// The provider whose construction asked for it, if any.
    pub required_by: Option<ServiceKey>,
    /// Registered contracts with similar names.
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not registered in the container", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

/// One step of a cyclic chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    pub key: RegistrationKey,
    pub scope: Scope,
}

/// Error when a resolution chain re-enters a registration.
///
/// The chain starts and ends with the same registration.
#[derive(Debug)]
pub struct CyclicDependencyError {
    pub chain: Vec<ChainLink>,
}

impl fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(|l| l.key.contract.short_name()).collect();
        writeln!(f, "Cyclic dependency detected: {}", render_chain(&names))?;

        let entries: Vec<ChainEntry> = self
            .chain
            .iter()
            .map(|l| ChainEntry {
                contract: l.key.contract.short_name(),
                provider: l.key.provider.short_name(),
                scope: l.scope.to_string(),
            })
            .collect();
        write!(f, "{}", render_chain_vertical(&entries))?;

        write!(
            f,
            "  Hint: break the cycle by resolving one side lazily inside a factory"
        )
    }
}

/// Convenient Result type for registrar operations.
pub type Result<T> = std::result::Result<T, RegistrarError>;

#[cfg(test)]
mod tests {
    use super::*;

    trait Repository {}
    struct SqlRepository;
    struct Reports;

    fn dependency_error(scope: Scope) -> DependencyError {
        DependencyError {
            dependent: RegistrationKey::of::<Reports, Reports>(),
            dependency: ServiceKey::of::<dyn Repository>(),
            scope,
        }
    }

    #[test]
    fn duplicate_registration_display() {
        let err = RegistrarError::DuplicateRegistration(RegistrationKey::of::<dyn Repository, SqlRepository>());
        let msg = err.to_string();
        assert!(msg.contains("dyn Repository is already registered to resolve SqlRepository"));
    }

    #[test]
    fn unregistered_dependency_names_scope() {
        let msg = RegistrarError::UnregisteredDependency(dependency_error(Scope::Managed)).to_string();
        assert!(msg.contains("Reports depends on dyn Repository"));
        assert!(msg.contains("Managed or longer"));
    }

    #[test]
    fn scope_too_short_display() {
        let msg = RegistrarError::DependencyScopeTooShort(dependency_error(Scope::Singleton)).to_string();
        assert!(msg.contains("shorter lifetime"));
        assert!(msg.contains("Singleton"));
    }

    #[test]
    fn ambiguous_dependency_display() {
        let err = RegistrarError::AmbiguousDependency {
            error: dependency_error(Scope::Volatile),
            providers: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("has 2 providers"));
        assert!(msg.contains("auto_resolve_overloaded_dependencies"));
    }

    #[test]
    fn not_registered_with_suggestions() {
        let err = RegistrarError::TypeNotRegistered(NotRegisteredError {
            requested: ServiceKey::of::<dyn Repository>(),
            required_by: Some(ServiceKey::of::<Reports>()),
            suggestions: vec!["app::SqlRepository".into()],
        });

        let msg = err.to_string();
        assert!(msg.contains("not registered"));
        assert!(msg.contains("Required by: Reports"));
        assert!(msg.contains("- app::SqlRepository"));
    }

    #[test]
    fn cyclic_dependency_display() {
        let a = ChainLink {
            key: RegistrationKey::of::<Reports, Reports>(),
            scope: Scope::Singleton,
        };
        let b = ChainLink {
            key: RegistrationKey::of::<dyn Repository, SqlRepository>(),
            scope: Scope::Singleton,
        };
        let err = RegistrarError::CyclicDependency(CyclicDependencyError { chain: vec![a, b, a] });

        let msg = err.to_string();
        assert!(msg.contains("Cyclic"));
        assert!(msg.contains("Reports → dyn Repository → Reports"));
        assert!(msg.contains("dyn Repository => SqlRepository"));
    }

    #[test]
    fn construction_failed_keeps_source() {
        let err = RegistrarError::construction::<SqlRepository>("connection refused");
        assert!(err.to_string().contains("Failed to construct SqlRepository: connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
