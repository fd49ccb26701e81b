//! Registration-time validation of the dependency graph.
//!
//! Every registration made through automatic construction is checked
//! before it is committed:
//! - the pair is not already registered
//! - the provider can stand in for the contract
//! - the provider has at most one constructor
//! - every constructor dependency is a registered, non-primitive contract
//!   that is either unambiguous or allowed to be overloaded, and has a
//!   registration living at least as long as the new one
//! - the graph stays acyclic once the registration is added
//!
//! Validation never mutates anything, so a failure leaves the container
//! exactly as it was.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::error::{ChainLink, CyclicDependencyError, DependencyError, RegistrarError, Result};
use crate::key::{RegistrationKey, ServiceKey};
use crate::registry::Registry;
use crate::scope::Scope;

/// A registration that has not been committed yet.
#[derive(Debug, Clone)]
pub(crate) struct Candidate<'a> {
    pub key: RegistrationKey,
    pub scope: Scope,
    /// Whether the provider declares the contract.
    pub assignable: bool,
    /// Number of public constructors the provider declares.
    pub constructors: usize,
    /// Dependencies of the single constructor; empty otherwise.
    pub dependencies: &'a [ServiceKey],
}

/// Checks a [`Candidate`] against the current registry.
pub(crate) struct Validator<'a> {
    registry: &'a Registry,
    auto_resolve_overloads: bool,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a Registry, auto_resolve_overloads: bool) -> Self {
        Self {
            registry,
            auto_resolve_overloads,
        }
    }

    /// Runs every check in order and returns the first failure.
    ///
    /// # Errors
    /// - [`RegistrarError::DuplicateRegistration`]
    /// - [`RegistrarError::UnassignableProvider`]
    /// - [`RegistrarError::AmbiguousConstructor`]
    /// - [`RegistrarError::PrimitiveDependency`]
    /// - [`RegistrarError::UnregisteredDependency`]
    /// - [`RegistrarError::AmbiguousDependency`]
    /// - [`RegistrarError::DependencyScopeTooShort`]
    /// - [`RegistrarError::CyclicDependency`]
    #[instrument(skip_all, name = "validate_registration", fields(key = %candidate.key, scope = %candidate.scope))]
    pub fn validate(&self, candidate: &Candidate<'_>) -> Result<()> {
        let result = self.run_checks(candidate);

        match &result {
            Ok(()) => debug!("Registration is valid ✓"),
            Err(err) => warn!(error = %err, "Registration rejected"),
        }

        result
    }

    fn run_checks(&self, candidate: &Candidate<'_>) -> Result<()> {
        if self.registry.has_registration(&candidate.key) {
            return Err(RegistrarError::DuplicateRegistration(candidate.key));
        }

        if !candidate.assignable {
            return Err(RegistrarError::UnassignableProvider(candidate.key));
        }

        if candidate.constructors > 1 {
            return Err(RegistrarError::AmbiguousConstructor {
                provider: candidate.key.provider,
                constructors: candidate.constructors,
            });
        }

        for dependency in candidate.dependencies {
            self.check_dependency(candidate, dependency)?;
        }

        CycleDetector::new(self.registry, candidate).detect()
    }

    fn check_dependency(&self, candidate: &Candidate<'_>, dependency: &ServiceKey) -> Result<()> {
        let error = || DependencyError {
            dependent: candidate.key,
            dependency: *dependency,
            scope: candidate.scope,
        };

        if dependency.is_primitive() {
            return Err(RegistrarError::PrimitiveDependency(error()));
        }

        let providers = self.registry.providers(dependency);

        if providers.is_empty() {
            return Err(RegistrarError::UnregisteredDependency(error()));
        }

        if providers.len() > 1 && !self.auto_resolve_overloads {
            return Err(RegistrarError::AmbiguousDependency {
                error: error(),
                providers: providers.len(),
            });
        }

        // Longer-lived dependents must not capture shorter-lived instances.
        if !providers.iter().any(|r| r.scope >= candidate.scope) {
            return Err(RegistrarError::DependencyScopeTooShort(error()));
        }

        Ok(())
    }
}

/// A node of the graph as it would look after the candidate is committed.
#[derive(Clone, Copy)]
struct Node<'a> {
    link: ChainLink,
    dependencies: &'a [ServiceKey],
}

/// Depth-first walk from the candidate, following for every dependency the
/// provider resolution would pick at the dependent's scope.
struct CycleDetector<'a> {
    registry: &'a Registry,
    candidate: &'a Candidate<'a>,
    /// Currently being visited
    visiting: HashSet<RegistrationKey>,
    /// Known to be cycle-free
    validated: HashSet<RegistrationKey>,
    /// Current DFS path, for error reporting
    path: Vec<ChainLink>,
}

impl<'a> CycleDetector<'a> {
    fn new(registry: &'a Registry, candidate: &'a Candidate<'a>) -> Self {
        Self {
            registry,
            candidate,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    fn detect(mut self) -> Result<()> {
        let root = Node {
            link: ChainLink {
                key: self.candidate.key,
                scope: self.candidate.scope,
            },
            dependencies: self.candidate.dependencies,
        };
        self.visit(root)
    }

    fn visit(&mut self, node: Node<'a>) -> Result<()> {
        let key = node.link.key;

        if self.validated.contains(&key) {
            return Ok(());
        }

        if self.visiting.contains(&key) {
            let start = self.path.iter().position(|l| l.key == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(node.link);

            warn!(cycle = ?chain, "Cyclic dependency detected!");
            return Err(RegistrarError::CyclicDependency(CyclicDependencyError { chain }));
        }

        self.visiting.insert(key);
        self.path.push(node.link);

        for dependency in node.dependencies {
            // Unresolvable edges are reported by the dependency checks, not here.
            if let Some(next) = self.select(dependency, node.link.scope) {
                self.visit(next)?;
            }
        }

        self.path.pop();
        self.visiting.remove(&key);
        self.validated.insert(key);

        Ok(())
    }

    /// Best-match selection over existing registrations followed by the candidate.
    fn select(&self, contract: &ServiceKey, minimum_scope: Scope) -> Option<Node<'a>> {
        if let Some(registration) = self.registry.first_suitable(contract, minimum_scope) {
            return Some(Node {
                link: ChainLink {
                    key: registration.key,
                    scope: registration.scope,
                },
                dependencies: &registration.activation.dependencies,
            });
        }

        let candidate = self.candidate;
        (candidate.key.contract == *contract && candidate.scope >= minimum_scope).then_some(Node {
            link: ChainLink {
                key: candidate.key,
                scope: candidate.scope,
            },
            dependencies: candidate.dependencies,
        })
    }
}
