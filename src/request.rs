//! Requests: what is being resolved, and the dependency chain leading to it.

use std::fmt;
use std::sync::Arc;

use crate::key::{Metadata, ServiceKey, TypeInfo};
use crate::registration::Factory;

/// Behaviour when no factory can be found for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IfUnresolved {
    /// Fail with `UnableToResolveUnknownService`.
    #[default]
    Throw,
    /// Produce an absent value instead.
    ReturnDefault,
}

/// How a dependency is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Resolved eagerly while building the parent.
    Service,
    /// Resolved on first access of a `Lazy` wrapper.
    Lazy,
    /// Resolved on each invocation of a `FactoryOf` wrapper.
    Factory,
}

impl RequestKind {
    pub fn is_deferred(self) -> bool {
        !matches!(self, RequestKind::Service)
    }
}

/// A top-level resolution request.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{IfUnresolved, ServiceRequest};
///
/// let request = ServiceRequest::of::<String>()
///     .keyed("greeting")
///     .if_unresolved(IfUnresolved::ReturnDefault);
/// assert_eq!(request.service_type().name(), "alloc::string::String");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRequest {
    service_type: TypeInfo,
    service_key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
    metadata: Option<Metadata>,
}

impl ServiceRequest {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::for_type(TypeInfo::of::<T>())
    }

    pub fn for_type(service_type: TypeInfo) -> Self {
        Self {
            service_type,
            service_key: None,
            if_unresolved: IfUnresolved::Throw,
            metadata: None,
        }
    }

    pub fn keyed(mut self, key: impl Into<ServiceKey>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    pub fn if_unresolved(mut self, if_unresolved: IfUnresolved) -> Self {
        self.if_unresolved = if_unresolved;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub(crate) fn with_key(mut self, key: Option<ServiceKey>) -> Self {
        self.service_key = key;
        self
    }

    pub(crate) fn with_optional_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn service_type(&self) -> TypeInfo {
        self.service_type
    }

    pub fn service_key(&self) -> Option<&ServiceKey> {
        self.service_key.as_ref()
    }

    pub fn unresolved_policy(&self) -> IfUnresolved {
        self.if_unresolved
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

impl fmt::Display for ServiceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.service_type)?;
        if let Some(key) = &self.service_key {
            write!(f, " with key {}", key)?;
        }
        if let Some(metadata) = &self.metadata {
            write!(f, " with metadata {:?}", metadata)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequestId(usize);

#[derive(Debug)]
pub(crate) struct RequestNode {
    pub(crate) service_type: TypeInfo,
    pub(crate) required_service_type: Option<TypeInfo>,
    pub(crate) service_key: Option<ServiceKey>,
    pub(crate) if_unresolved: IfUnresolved,
    pub(crate) metadata: Option<Metadata>,
    pub(crate) kind: RequestKind,
    pub(crate) parent: Option<RequestId>,
}

/// Flat storage for one resolution's request chain.
///
/// Nodes point to their parent by index; the factory chosen for a node is
/// recorded in a side table once selection succeeds.
#[derive(Default)]
pub(crate) struct RequestArena {
    nodes: Vec<RequestNode>,
    factories: Vec<Option<Arc<Factory>>>,
}

impl RequestArena {
    pub(crate) fn push(&mut self, node: RequestNode) -> RequestId {
        self.nodes.push(node);
        self.factories.push(None);
        RequestId(self.nodes.len() - 1)
    }

    pub(crate) fn set_factory(&mut self, id: RequestId, factory: Arc<Factory>) {
        self.factories[id.0] = Some(factory);
    }

    pub(crate) fn node(&self, id: RequestId) -> &RequestNode {
        &self.nodes[id.0]
    }

    pub(crate) fn view(&self, id: RequestId) -> Request<'_> {
        Request { arena: self, id }
    }
}

/// Read-only view of a request and its ancestors.
///
/// Handed to factory selectors, unknown-service resolvers and capability
/// providers so they can decide based on where in the graph a service is
/// being requested.
#[derive(Clone, Copy)]
pub struct Request<'a> {
    arena: &'a RequestArena,
    id: RequestId,
}

impl<'a> Request<'a> {
    fn node(&self) -> &'a RequestNode {
        self.arena.node(self.id)
    }

    /// Requested type; the wrapper type for deferred requests.
    pub fn service_type(&self) -> TypeInfo {
        self.node().service_type
    }

    /// Type wrapped by a deferred request.
    pub fn required_service_type(&self) -> Option<TypeInfo> {
        self.node().required_service_type
    }

    /// Type looked up in the registry.
    pub fn lookup_type(&self) -> TypeInfo {
        let node = self.node();
        node.required_service_type.unwrap_or(node.service_type)
    }

    pub fn service_key(&self) -> Option<&'a ServiceKey> {
        self.node().service_key.as_ref()
    }

    pub fn if_unresolved(&self) -> IfUnresolved {
        self.node().if_unresolved
    }

    pub fn metadata(&self) -> Option<&'a Metadata> {
        self.node().metadata.as_ref()
    }

    pub fn kind(&self) -> RequestKind {
        self.node().kind
    }

    pub fn parent(&self) -> Option<Request<'a>> {
        self.node().parent.map(|id| self.arena.view(id))
    }

    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    /// Factory selected for this request, once resolved.
    pub fn factory(&self) -> Option<&'a Arc<Factory>> {
        self.arena.factories[self.id.0].as_ref()
    }

    pub fn implementation_type(&self) -> Option<TypeInfo> {
        self.factory().and_then(|f| f.implementation_type())
    }

    /// Iterates from the parent up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Request<'a>> {
        std::iter::successors(self.parent(), |r| r.parent())
    }

    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }
}

impl fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("service_type", &self.service_type())
            .field("service_key", &self.service_key())
            .field("kind", &self.kind())
            .field("depth", &self.depth())
            .finish()
    }
}
