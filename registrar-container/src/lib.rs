//! Core container implementation for Registrar.
//!
//! Contracts (usually `dyn Trait`) are bound to providers (concrete
//! types) with a [`Scope`]. Registrations are validated against the
//! existing graph when they are made, so resolution of a registered
//! contract only fails if a factory or constructor fails.

pub mod cache;
pub mod container;
pub mod error;
pub mod graph;
pub mod key;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod settings;
pub mod strategy;

pub use container::{Container, prelude};
pub use error::{RegistrarError, Result};
pub use key::{RegistrationKey, ServiceKey};
pub use provider::{Injectable, ProviderDescriptor};
pub use resolver::Resolver;
pub use scope::Scope;
pub use settings::ContainerSettings;
