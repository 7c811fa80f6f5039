//! Constructor parameters and the pluggable capability provider that turns
//! them into resolvable dependencies.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::DiResult;
use crate::key::{Metadata, ServiceKey, TypeInfo};
use crate::registration::Implementation;
use crate::request::{IfUnresolved, Request, RequestKind};
use crate::rules::Item;
use crate::wrappers::{FactoryOf, Lazy, ResolutionScope};

/// How a parameter consumes its dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Service,
    Lazy,
    Factory,
    /// The enclosing resolution scope handle.
    ResolutionScope,
}

impl DependencyKind {
    pub(crate) fn request_kind(self) -> RequestKind {
        match self {
            DependencyKind::Lazy => RequestKind::Lazy,
            DependencyKind::Factory => RequestKind::Factory,
            DependencyKind::Service | DependencyKind::ResolutionScope => RequestKind::Service,
        }
    }
}

/// A declared constructor parameter.
///
/// Annotations are arbitrary typed values a capability provider can inspect,
/// for example an import key or required metadata.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::Parameter;
///
/// struct Import(&'static str);
///
/// let p = Parameter::of::<String>("greeting").annotated(Import("hello"));
/// assert_eq!(p.name(), "greeting");
/// assert_eq!(p.annotation::<Import>().map(|i| i.0), Some("hello"));
/// ```
#[derive(Clone)]
pub struct Parameter {
    name: &'static str,
    service_type: TypeInfo,
    required_service_type: Option<TypeInfo>,
    kind: DependencyKind,
    service_key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
    metadata: Option<Metadata>,
    annotations: Vec<Arc<dyn Any + Send + Sync>>,
}

impl Parameter {
    fn with(name: &'static str, service_type: TypeInfo, required: Option<TypeInfo>, kind: DependencyKind) -> Self {
        Self {
            name,
            service_type,
            required_service_type: required,
            kind,
            service_key: None,
            if_unresolved: IfUnresolved::Throw,
            metadata: None,
            annotations: Vec::new(),
        }
    }

    /// A required service dependency.
    pub fn of<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::with(name, TypeInfo::of::<T>(), None, DependencyKind::Service)
    }

    /// A service dependency that becomes `None` when unresolved.
    pub fn optional<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::of::<T>(name).if_unresolved(IfUnresolved::ReturnDefault)
    }

    /// A `Lazy<T>` dependency.
    pub fn lazy<T: ?Sized + Send + Sync + 'static>(name: &'static str) -> Self {
        Self::with(name, TypeInfo::of::<Lazy<T>>(), Some(TypeInfo::of::<T>()), DependencyKind::Lazy)
    }

    /// A `FactoryOf<T>` dependency.
    pub fn factory<T: ?Sized + Send + Sync + 'static>(name: &'static str) -> Self {
        Self::with(name, TypeInfo::of::<FactoryOf<T>>(), Some(TypeInfo::of::<T>()), DependencyKind::Factory)
    }

    /// The enclosing resolution scope.
    pub fn resolution_scope(name: &'static str) -> Self {
        Self::with(name, TypeInfo::of::<ResolutionScope>(), None, DependencyKind::ResolutionScope)
    }

    pub fn keyed(mut self, key: impl Into<ServiceKey>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    pub fn if_unresolved(mut self, if_unresolved: IfUnresolved) -> Self {
        self.if_unresolved = if_unresolved;
        self
    }

    /// Restricts the dependency to registrations carrying equal metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn annotated<A: Any + Send + Sync>(mut self, annotation: A) -> Self {
        self.annotations.push(Arc::new(annotation));
        self
    }

    pub fn annotation<A: Any + Send + Sync>(&self) -> Option<&A> {
        self.annotations.iter().find_map(|a| a.downcast_ref::<A>())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn service_type(&self) -> TypeInfo {
        self.service_type
    }

    pub fn required_service_type(&self) -> Option<TypeInfo> {
        self.required_service_type
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("service_type", &self.service_type)
            .field("kind", &self.kind)
            .field("service_key", &self.service_key)
            .field("if_unresolved", &self.if_unresolved)
            .finish()
    }
}

/// A parameter after the capability provider decided how to satisfy it.
///
/// Either resolved from the container by type, key and metadata, or supplied
/// as a constant value.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub(crate) service_type: TypeInfo,
    pub(crate) required_service_type: Option<TypeInfo>,
    pub(crate) kind: DependencyKind,
    pub(crate) service_key: Option<ServiceKey>,
    pub(crate) if_unresolved: IfUnresolved,
    pub(crate) metadata: Option<Metadata>,
    pub(crate) value: Option<Item>,
}

impl Dependency {
    pub fn with_key(mut self, key: impl Into<ServiceKey>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_if_unresolved(mut self, if_unresolved: IfUnresolved) -> Self {
        self.if_unresolved = if_unresolved;
        self
    }

    /// Satisfies the dependency with a constant instead of a resolution.
    pub fn with_value(mut self, value: Item) -> Self {
        self.value = Some(value);
        self
    }

    pub fn service_type(&self) -> TypeInfo {
        self.service_type
    }

    pub fn lookup_type(&self) -> TypeInfo {
        self.required_service_type.unwrap_or(self.service_type)
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    pub fn service_key(&self) -> Option<&ServiceKey> {
        self.service_key.as_ref()
    }

    pub fn value(&self) -> Option<&Item> {
        self.value.as_ref()
    }
}

impl From<&Parameter> for Dependency {
    fn from(p: &Parameter) -> Self {
        Self {
            service_type: p.service_type,
            required_service_type: p.required_service_type,
            kind: p.kind,
            service_key: p.service_key.clone(),
            if_unresolved: p.if_unresolved,
            metadata: p.metadata.clone(),
            value: None,
        }
    }
}

/// Decides the dependencies of an implementation being constructed.
///
/// The default provider uses declared parameters as-is. Custom providers can
/// rewrite keys, metadata or constant values per parameter, for instance
/// based on annotations.
pub trait CapabilityProvider: Send + Sync {
    fn dependencies(&self, implementation: &Implementation, request: &Request<'_>) -> DiResult<Vec<Dependency>>;
}

/// Uses declared parameters with registered argument values applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclaredParameters;

impl CapabilityProvider for DeclaredParameters {
    fn dependencies(&self, implementation: &Implementation, _request: &Request<'_>) -> DiResult<Vec<Dependency>> {
        Ok(implementation.declared_dependencies())
    }
}

type ParameterFn = dyn Fn(&Parameter, &Request<'_>) -> Option<Dependency> + Send + Sync;

/// Per-parameter override rule.
///
/// Registered argument values win; otherwise the closure may return a
/// replacement dependency, and `None` keeps the declared one.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Dependency, ParameterRule, Rules};
///
/// struct Import(&'static str);
///
/// let rules = Rules::default().with_capabilities(ParameterRule::new(|parameter, _request| {
///     parameter
///         .annotation::<Import>()
///         .map(|import| Dependency::from(parameter).with_key(import.0))
/// }));
/// # let _ = rules;
/// ```
#[derive(Clone)]
pub struct ParameterRule(Arc<ParameterFn>);

impl ParameterRule {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Parameter, &Request<'_>) -> Option<Dependency> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl CapabilityProvider for ParameterRule {
    fn dependencies(&self, implementation: &Implementation, request: &Request<'_>) -> DiResult<Vec<Dependency>> {
        Ok(implementation
            .parameters()
            .iter()
            .enumerate()
            .map(|(index, parameter)| match implementation.argument(index) {
                Some(item) => Dependency::from(parameter).with_value(item.clone()),
                None => (self.0)(parameter, request).unwrap_or_else(|| Dependency::from(parameter)),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_parameters_look_up_inner_type() {
        let p = Parameter::lazy::<String>("text");
        let d = Dependency::from(&p);
        assert_eq!(d.kind(), DependencyKind::Lazy);
        assert_eq!(d.service_type(), TypeInfo::of::<Lazy<String>>());
        assert_eq!(d.lookup_type(), TypeInfo::of::<String>());
    }

    #[test]
    fn optional_parameter_returns_default() {
        let d = Dependency::from(&Parameter::optional::<u8>("n"));
        assert_eq!(d.if_unresolved, IfUnresolved::ReturnDefault);
        assert_eq!(d.lookup_type(), TypeInfo::of::<u8>());
    }
}
