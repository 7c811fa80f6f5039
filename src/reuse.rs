//! Reuse policies controlling instance caching and ownership.

use std::borrow::Cow;
use std::fmt;

use crate::key::{ServiceKey, TypeInfo};

/// Name of a scope.
///
/// Ambient scopes are opened by the caller with an optional name. Resolution
/// scopes are named after the service that opened them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeName {
    /// Caller-chosen name of an ambient scope.
    Named(Cow<'static, str>),
    /// Resolution scope opened for the given anchor service.
    Resolution {
        service: TypeInfo,
        key: Option<ServiceKey>,
    },
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeName::Named(name) => f.write_str(name),
            ScopeName::Resolution { service, key: Some(key) } => {
                write!(f, "resolution scope of {} {}", service, key)
            }
            ScopeName::Resolution { service, key: None } => {
                write!(f, "resolution scope of {}", service)
            }
        }
    }
}

impl From<&'static str> for ScopeName {
    fn from(name: &'static str) -> Self {
        ScopeName::Named(Cow::Borrowed(name))
    }
}

impl From<String> for ScopeName {
    fn from(name: String) -> Self {
        ScopeName::Named(Cow::Owned(name))
    }
}

/// Reuse policy applied to the output of a factory.
///
/// - **Transient**: a fresh instance per resolution, never cached
/// - **Singleton**: one instance for the lifetime of the container
/// - **Scoped**: one instance per matching ambient scope
/// - **InResolutionScopeOf**: one instance per resolution scope opened by an anchor service
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Container, Registration, Resolver, Reuse, Injectable, Arguments, DiResult};
/// use std::sync::Arc;
///
/// struct RequestContext;
/// impl Injectable for RequestContext {
///     fn construct(_: &mut Arguments) -> DiResult<Self> { Ok(RequestContext) }
/// }
///
/// let container = Container::new();
/// container.register(Registration::<RequestContext>::new().reuse(Reuse::scoped())).unwrap();
///
/// let scope1 = container.open_scope(None);
/// let a = scope1.resolve::<RequestContext>().unwrap();
/// let b = scope1.resolve::<RequestContext>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let scope2 = container.open_scope(None);
/// let c = scope2.resolve::<RequestContext>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &c));
///
/// // No ambient scope: scoped reuse cannot be satisfied
/// assert!(container.resolve::<RequestContext>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Reuse {
    /// New instance per resolution, never cached
    #[default]
    Transient,
    /// Single instance per container, cached in the singleton scope
    Singleton,
    /// Single instance per ambient scope (nearest scope with the name, or the current one)
    Scoped { name: Option<ScopeName> },
    /// Single instance per resolution scope opened by the anchor service (or the nearest one)
    InResolutionScopeOf {
        anchor: Option<TypeInfo>,
        key: Option<ServiceKey>,
    },
}

impl Reuse {
    /// Reuse in the current ambient scope.
    pub fn scoped() -> Self {
        Reuse::Scoped { name: None }
    }

    /// Reuse in the nearest ambient scope with the given name.
    pub fn scoped_to(name: impl Into<ScopeName>) -> Self {
        Reuse::Scoped { name: Some(name.into()) }
    }

    /// Reuse in the resolution scope opened by `A`.
    pub fn in_resolution_scope_of<A: ?Sized + 'static>() -> Self {
        Reuse::InResolutionScopeOf {
            anchor: Some(TypeInfo::of::<A>()),
            key: None,
        }
    }

    /// Reuse in the nearest resolution scope, whatever opened it.
    pub fn in_resolution_scope() -> Self {
        Reuse::InResolutionScopeOf { anchor: None, key: None }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Reuse::Transient)
    }
}

impl fmt::Display for Reuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reuse::Transient => f.write_str("transient"),
            Reuse::Singleton => f.write_str("singleton"),
            Reuse::Scoped { name: None } => f.write_str("scoped"),
            Reuse::Scoped { name: Some(name) } => write!(f, "scoped to {}", name),
            Reuse::InResolutionScopeOf { anchor: None, .. } => f.write_str("in resolution scope"),
            Reuse::InResolutionScopeOf { anchor: Some(anchor), .. } => {
                write!(f, "in resolution scope of {}", anchor)
            }
        }
    }
}
