//! Service identity types: type info, service keys and registration metadata.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime identity of a (possibly unsized) service type.
///
/// Equality and hashing use the `TypeId` only; the name is kept for
/// diagnostics and error messages.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::TypeInfo;
///
/// trait Logger: Send + Sync {}
///
/// let a = TypeInfo::of::<dyn Logger>();
/// let b = TypeInfo::of::<dyn Logger>();
/// assert_eq!(a, b);
/// assert!(a.name().contains("Logger"));
/// assert_ne!(a, TypeInfo::of::<String>());
/// ```
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeInfo {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Key distinguishing several registrations of the same service type.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::ServiceKey;
///
/// let named: ServiceKey = "primary".into();
/// let indexed: ServiceKey = 3usize.into();
/// assert_eq!(named.to_string(), "\"primary\"");
/// assert_eq!(indexed, ServiceKey::Index(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKey {
    Name(Cow<'static, str>),
    Index(usize),
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKey::Name(name) => write!(f, "{:?}", name),
            ServiceKey::Index(index) => write!(f, "#{}", index),
        }
    }
}

impl From<&'static str> for ServiceKey {
    fn from(name: &'static str) -> Self {
        ServiceKey::Name(Cow::Borrowed(name))
    }
}

impl From<String> for ServiceKey {
    fn from(name: String) -> Self {
        ServiceKey::Name(Cow::Owned(name))
    }
}

impl From<usize> for ServiceKey {
    fn from(index: usize) -> Self {
        ServiceKey::Index(index)
    }
}

/// Type-erased, comparable metadata attached to a registration.
///
/// Two metadata values are equal when they have the same type and the
/// values compare equal. Consumers use metadata to pick one of several
/// registrations of the same service.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::Metadata;
///
/// #[derive(Debug, PartialEq)]
/// enum Flavor { Hey, Blah }
///
/// assert_eq!(Metadata::new(Flavor::Blah), Metadata::new(Flavor::Blah));
/// assert_ne!(Metadata::new(Flavor::Hey), Metadata::new(Flavor::Blah));
/// assert_eq!(Metadata::new(Flavor::Hey).downcast_ref::<Flavor>(), Some(&Flavor::Hey));
/// ```
#[derive(Clone)]
pub struct Metadata {
    value: Arc<dyn Any + Send + Sync>,
    type_info: TypeInfo,
    eq: fn(&(dyn Any + Send + Sync), &(dyn Any + Send + Sync)) -> bool,
    debug: fn(&(dyn Any + Send + Sync), &mut fmt::Formatter<'_>) -> fmt::Result,
}

impl Metadata {
    pub fn new<T>(value: T) -> Self
    where
        T: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        fn eq<T: PartialEq + 'static>(a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
            match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        fn debug<T: fmt::Debug + 'static>(v: &(dyn Any + Send + Sync), f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match v.downcast_ref::<T>() {
                Some(v) => v.fmt(f),
                None => f.write_str("<metadata>"),
            }
        }

        Self {
            value: Arc::new(value),
            type_info: TypeInfo::of::<T>(),
            eq: eq::<T>,
            debug: debug::<T>,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        self.type_info == other.type_info && (self.eq)(&*self.value, &*other.value)
    }
}

impl Eq for Metadata {}

// Hash by type only; equal values always share a type.
impl Hash for Metadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_info.hash(state);
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.debug)(&*self.value, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn type_info_ignores_name_for_identity() {
        let mut set = HashSet::new();
        set.insert(TypeInfo::of::<u32>());
        set.insert(TypeInfo::of::<u32>());
        set.insert(TypeInfo::of::<u64>());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn metadata_of_different_types_never_equal() {
        assert_ne!(Metadata::new(1u32), Metadata::new(1u64));
        assert_eq!(format!("{:?}", Metadata::new("blah")), "\"blah\"");
    }
}
