//! Provider descriptors.
//!
//! A provider is a concrete type that can satisfy one or more contracts.
//! Instead of reflecting over constructors at runtime, every provider
//! describes itself with a [`ProviderDescriptor`]: its public
//! constructors (each a dependency list plus a positional builder) and
//! the contracts it can be cast to.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use registrar_container::provider::{Injectable, ProviderDescriptor};
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! trait Audit: Send + Sync {}
//!
//! struct SystemClock;
//! impl Clock for SystemClock {
//!     fn now(&self) -> u64 { 0 }
//! }
//!
//! struct FileAudit {
//!     clock: Arc<dyn Clock>,
//! }
//! impl Audit for FileAudit {}
//!
//! impl Injectable for SystemClock {
//!     fn descriptor() -> ProviderDescriptor<Self> {
//!         ProviderDescriptor::new()
//!             .constructor(|| SystemClock)
//!             .implements::<dyn Clock>(|p| p)
//!     }
//! }
//!
//! impl Injectable for FileAudit {
//!     fn descriptor() -> ProviderDescriptor<Self> {
//!         ProviderDescriptor::new()
//!             .constructor(|clock: Arc<dyn Clock>| FileAudit { clock })
//!             .implements::<dyn Audit>(|p| p)
//!     }
//! }
//!
//! let descriptor = FileAudit::descriptor();
//! assert_eq!(descriptor.constructors().len(), 1);
//! assert_eq!(descriptor.constructors()[0].arity(), 1);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{RegistrarError, Result};
use crate::key::ServiceKey;

/// A type-erased provider instance, as produced by a constructor or factory.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A type-erased `Arc<C>` for some contract `C`.
pub(crate) type Contracted = Box<dyn Any + Send + Sync>;

/// Types the container can build and hand out.
///
/// Implement this for every provider type you register.
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Describes how to build `Self` and which contracts it satisfies.
    fn descriptor() -> ProviderDescriptor<Self>;
}

/// Constructors and contract casts of provider `P`.
pub struct ProviderDescriptor<P> {
    constructors: Vec<Constructor<P>>,
    casts: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    contracts: Vec<ServiceKey>,
}

impl<P: Send + Sync + 'static> ProviderDescriptor<P> {
    /// Creates a descriptor with no constructors that implements only `P` itself.
    pub fn new() -> Self {
        let descriptor = Self {
            constructors: Vec::new(),
            casts: HashMap::new(),
            contracts: Vec::new(),
        };
        descriptor.implements::<P>(identity)
    }

    /// Adds a public constructor.
    ///
    /// `build` takes one `Arc<D>` per dependency contract `D` and is
    /// invoked positionally with the resolved dependencies.
    pub fn constructor<Deps, F>(mut self, build: F) -> Self
    where
        F: ConstructorFn<Deps, P>,
    {
        self.constructors.push(Constructor::new(build));
        self
    }

    /// Declares that `P` can stand in for contract `C`.
    pub fn implements<C>(mut self, cast: fn(Arc<P>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        if self.casts.insert(TypeId::of::<C>(), Box::new(cast)).is_none() {
            self.contracts.push(ServiceKey::of::<C>());
        }
        self
    }

    pub fn constructors(&self) -> &[Constructor<P>] {
        &self.constructors
    }

    /// Contracts this provider can be registered for, in declaration order.
    pub fn contracts(&self) -> &[ServiceKey] {
        &self.contracts
    }

    /// Returns `true` if `P` can be registered for contract `C`.
    pub fn is_assignable_to<C: ?Sized + 'static>(&self) -> bool {
        self.casts.contains_key(&TypeId::of::<C>())
    }

    fn cast_to<C: ?Sized + 'static>(&self) -> Option<fn(Arc<P>) -> Arc<C>> {
        self.casts
            .get(&TypeId::of::<C>())
            .and_then(|cast| cast.downcast_ref::<fn(Arc<P>) -> Arc<C>>())
            .copied()
    }
}

impl<P: Send + Sync + 'static> Default for ProviderDescriptor<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> fmt::Debug for ProviderDescriptor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("provider", &ServiceKey::of::<P>())
            .field("constructors", &self.constructors.len())
            .field("contracts", &self.contracts)
            .finish()
    }
}

fn identity<P>(provider: Arc<P>) -> Arc<P> {
    provider
}

/// A public constructor: dependency contracts plus a builder of the same arity.
pub struct Constructor<P> {
    dependencies: Vec<ServiceKey>,
    build: Arc<dyn Fn(&mut Arguments) -> Result<P> + Send + Sync>,
}

impl<P: 'static> Constructor<P> {
    pub fn new<Deps, F>(build: F) -> Self
    where
        F: ConstructorFn<Deps, P>,
    {
        Self {
            dependencies: F::dependencies(),
            build: Arc::new(move |args: &mut Arguments| build.construct(args)),
        }
    }

    /// Dependency contracts, in parameter order.
    pub fn dependencies(&self) -> &[ServiceKey] {
        &self.dependencies
    }

    pub fn arity(&self) -> usize {
        self.dependencies.len()
    }

    pub fn invoke(&self, args: &mut Arguments) -> Result<P> {
        (self.build)(args)
    }
}

impl<P> Clone for Constructor<P> {
    fn clone(&self) -> Self {
        Self {
            dependencies: self.dependencies.clone(),
            build: self.build.clone(),
        }
    }
}

/// Resolved dependency values handed to a constructor, in parameter order.
pub struct Arguments {
    provider: ServiceKey,
    values: std::vec::IntoIter<Contracted>,
}

impl Arguments {
    pub(crate) fn new(provider: ServiceKey, values: Vec<Contracted>) -> Self {
        Self {
            provider,
            values: values.into_iter(),
        }
    }

    /// Number of values not yet taken.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    /// Takes the next positional value as `Arc<D>`.
    pub fn take<D: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<D>> {
        let provider = self.provider;
        let value = self.values.next().ok_or_else(|| RegistrarError::ConstructionFailed {
            key: provider,
            source: format!("missing constructor argument for {}", ServiceKey::of::<D>()).into(),
        })?;

        value.downcast::<Arc<D>>().map(|boxed| *boxed).map_err(|_| {
            RegistrarError::ConstructionFailed {
                key: provider,
                source: format!("constructor argument is not an Arc<{}>", ServiceKey::of::<D>()).into(),
            }
        })
    }
}

/// Closures usable as constructors: `Fn(Arc<D1>, …, Arc<Dn>) -> P`.
///
/// Implemented for up to eight dependencies.
pub trait ConstructorFn<Deps, P>: Send + Sync + 'static {
    fn dependencies() -> Vec<ServiceKey>;

    fn construct(&self, args: &mut Arguments) -> Result<P>;
}

macro_rules! impl_constructor_fn {
    ($($ty:ident),*) => {
        impl<F, P, $($ty,)*> ConstructorFn<($(Arc<$ty>,)*), P> for F
        where
            F: Fn($(Arc<$ty>),*) -> P + Send + Sync + 'static,
            $( $ty: ?Sized + Send + Sync + 'static, )*
        {
            fn dependencies() -> Vec<ServiceKey> {
                vec![$(ServiceKey::of::<$ty>()),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn construct(&self, args: &mut Arguments) -> Result<P> {
                $( let $ty = args.take::<$ty>()?; )*
                Ok(self($($ty),*))
            }
        }
    };
}

impl_constructor_fn!();
impl_constructor_fn!(D1);
impl_constructor_fn!(D1, D2);
impl_constructor_fn!(D1, D2, D3);
impl_constructor_fn!(D1, D2, D3, D4);
impl_constructor_fn!(D1, D2, D3, D4, D5);
impl_constructor_fn!(D1, D2, D3, D4, D5, D6);
impl_constructor_fn!(D1, D2, D3, D4, D5, D6, D7);
impl_constructor_fn!(D1, D2, D3, D4, D5, D6, D7, D8);

type ConstructFn = Arc<dyn Fn(&mut Arguments) -> Result<Instance> + Send + Sync>;
type CastFn = Arc<dyn Fn(Instance) -> Result<Contracted> + Send + Sync>;

/// Everything the resolver needs to build a provider for one contract,
/// with the provider and contract types erased.
pub(crate) struct Activation {
    /// Dependencies of the single constructor, empty otherwise.
    pub dependencies: Vec<ServiceKey>,
    /// Present only when the provider has exactly one constructor.
    pub construct: Option<ConstructFn>,
    /// Turns a provider instance into a boxed `Arc<C>`.
    pub cast: CastFn,
}

impl Activation {
    /// Erases `descriptor` for contract `C`.
    ///
    /// Fails with [`RegistrarError::UnassignableProvider`] if `P` does
    /// not implement `C`.
    pub fn new<C, P>(descriptor: &ProviderDescriptor<P>) -> Result<Self>
    where
        C: ?Sized + Send + Sync + 'static,
        P: Send + Sync + 'static,
    {
        let cast = descriptor.cast_to::<C>().ok_or_else(|| {
            RegistrarError::UnassignableProvider(crate::key::RegistrationKey::of::<C, P>())
        })?;

        let (dependencies, construct) = match descriptor.constructors() {
            [single] => {
                let ctor = single.clone();
                let construct: ConstructFn = Arc::new(move |args: &mut Arguments| {
                    ctor.invoke(args).map(|p| Arc::new(p) as Instance)
                });
                (single.dependencies().to_vec(), Some(construct))
            }
            _ => (Vec::new(), None),
        };

        Ok(Self {
            dependencies,
            construct,
            cast: Arc::new(move |instance: Instance| -> Result<Contracted> {
                let provider = instance.downcast::<P>().map_err(|_| {
                    RegistrarError::construction::<P>("cached instance has an unexpected type")
                })?;
                Ok(Box::new(cast(provider)) as Contracted)
            }),
        })
    }

    /// Drops the constructor data; a factory builds the provider instead.
    pub fn factory_only(mut self) -> Self {
        self.dependencies.clear();
        self.construct = None;
        self
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("dependencies", &self.dependencies)
            .field("constructible", &self.construct.is_some())
            .finish()
    }
}
