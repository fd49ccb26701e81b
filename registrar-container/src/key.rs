//! Contract and provider identification.
//!
//! [`ServiceKey`] identifies a type inside the container. Contracts
//! (usually `dyn Trait`) and providers (concrete types) share the same
//! key type; a registration is addressed by a [`RegistrationKey`].

use std::any::{TypeId, type_name};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use registrar_support::rendering::shorten_type_name;

/// Uniquely identifies a contract or provider type.
///
/// Equality and hashing use only the [`TypeId`]; the type name is kept
/// for diagnostics.
///
/// # Examples
/// ```
/// use registrar_container::key::ServiceKey;
///
/// trait Clock: Send + Sync {}
///
/// let key = ServiceKey::of::<dyn Clock>();
/// assert_eq!(key.short_name(), "dyn Clock");
/// assert_eq!(key, ServiceKey::of::<dyn Clock>());
/// ```
#[derive(Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without module paths.
    pub fn short_name(&self) -> String {
        shorten_type_name(self.type_name)
    }

    /// Returns `true` for scalar value types, strings and their `Option`s.
    ///
    /// These can never be resolved from the container and must be
    /// supplied through a factory instead.
    pub fn is_primitive(&self) -> bool {
        PRIMITIVES.contains(&self.type_id)
    }
}

macro_rules! primitive_ids {
    ($($ty:ty),* $(,)?) => {
        [$(TypeId::of::<$ty>(), TypeId::of::<Option<$ty>>(),)*]
    };
}

static PRIMITIVES: Lazy<HashSet<TypeId>> = Lazy::new(|| {
    let mut ids: HashSet<TypeId> = primitive_ids![
        bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
        String, &'static str,
    ]
    .into_iter()
    .collect();
    ids.insert(TypeId::of::<()>());
    ids.insert(TypeId::of::<str>());
    ids
});

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({})", self.type_name)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// A (contract, provider) pair: the address of one registration,
/// strategy, or cached instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationKey {
    pub contract: ServiceKey,
    pub provider: ServiceKey,
}

impl RegistrationKey {
    #[inline]
    pub fn new(contract: ServiceKey, provider: ServiceKey) -> Self {
        Self { contract, provider }
    }

    /// Creates the key for contract `C` resolved by provider `P`.
    #[inline]
    pub fn of<C: ?Sized + 'static, P: ?Sized + 'static>() -> Self {
        Self::new(ServiceKey::of::<C>(), ServiceKey::of::<P>())
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.contract, self.provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Repository: Send + Sync {}
    struct SqlRepository;

    #[test]
    fn key_of_type() {
        let key = ServiceKey::of::<SqlRepository>();
        assert!(key.type_name().contains("SqlRepository"));
        assert_eq!(key.short_name(), "SqlRepository");
    }

    #[test]
    fn trait_object_keys_differ_from_providers() {
        assert_ne!(ServiceKey::of::<dyn Repository>(), ServiceKey::of::<SqlRepository>());
        assert_eq!(ServiceKey::of::<dyn Repository>(), ServiceKey::of::<dyn Repository>());
    }

    #[test]
    fn display_uses_short_name() {
        assert_eq!(format!("{}", ServiceKey::of::<dyn Repository>()), "dyn Repository");
    }

    #[test]
    fn primitives_are_recognised() {
        assert!(ServiceKey::of::<i32>().is_primitive());
        assert!(ServiceKey::of::<Option<u64>>().is_primitive());
        assert!(ServiceKey::of::<String>().is_primitive());
        assert!(ServiceKey::of::<str>().is_primitive());
        assert!(!ServiceKey::of::<SqlRepository>().is_primitive());
        assert!(!ServiceKey::of::<dyn Repository>().is_primitive());
    }

    #[test]
    fn registration_keys_in_hashmap() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(RegistrationKey::of::<dyn Repository, SqlRepository>(), "sql");

        assert_eq!(map.get(&RegistrationKey::of::<dyn Repository, SqlRepository>()), Some(&"sql"));
        assert_eq!(map.get(&RegistrationKey::of::<SqlRepository, SqlRepository>()), None);
    }

    #[test]
    fn registration_key_display() {
        let key = RegistrationKey::of::<dyn Repository, SqlRepository>();
        assert_eq!(key.to_string(), "dyn Repository => SqlRepository");
    }
}
