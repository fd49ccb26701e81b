//! # Registrar — validating service-resolution container for Rust
//!
//! Bind contracts to providers with a lifetime [`Scope`], get every
//! registration checked against the existing dependency graph, and
//! resolve instances on demand.
//!
//! ```rust
//! use registrar::prelude::*;
//!
//! struct Clock;
//! impl Injectable for Clock {
//!     fn descriptor() -> ProviderDescriptor<Self> {
//!         ProviderDescriptor::new().constructor(|| Clock)
//!     }
//! }
//!
//! let container = Container::new();
//! container.register::<Clock, Clock>(Scope::Singleton)?;
//! assert_eq!(container.registered_count(), 1);
//! # Ok::<(), RegistrarError>(())
//! ```

pub use registrar_container::*;
pub use registrar_support::*;
