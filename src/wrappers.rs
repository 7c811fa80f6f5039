//! Deferred wrappers and the resolution scope handle.
//!
//! `Lazy<T>` and `FactoryOf<T>` capture a request together with the scopes
//! current at capture time. They hold only weak references, so a wrapper
//! never keeps a container or scope alive.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult};
use crate::provider::{ContainerInner, ExecContext, ScopeData};
use crate::registration::Instance;
use crate::request::ServiceRequest;
use crate::reuse::ScopeName;

/// How a deferred request is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredKind {
    /// Resolved once on first access, owned like the consumer.
    Lazy,
    /// Resolved on every invocation, owned by the ambient scope at capture.
    Factory,
}

#[derive(Clone)]
struct ScopeRef {
    id: u64,
    data: Weak<ScopeData>,
}

impl ScopeRef {
    fn capture(scope: &Option<Arc<ScopeData>>) -> Option<Self> {
        scope.as_ref().map(|data| ScopeRef {
            id: data.id(),
            data: Arc::downgrade(data),
        })
    }

    fn upgrade(this: &Option<Self>) -> DiResult<Option<Arc<ScopeData>>> {
        match this {
            None => Ok(None),
            Some(scope) => {
                let data = scope.data.upgrade().ok_or(DiError::ScopeIsDisposed { id: scope.id })?;
                // Disposed but still referenced by a live handle
                data.ensure_live()?;
                Ok(Some(data))
            }
        }
    }
}

/// A request captured for later resolution.
#[derive(Clone)]
pub struct DeferredRequest {
    container: Weak<ContainerInner>,
    request: ServiceRequest,
    kind: DeferredKind,
    ambient: Option<ScopeRef>,
    owner: Option<ScopeRef>,
    resolution: Option<ScopeRef>,
}

impl DeferredRequest {
    pub(crate) fn capture(request: ServiceRequest, kind: DeferredKind, ctx: &ExecContext<'_>) -> Self {
        let owner = match kind {
            DeferredKind::Lazy => &ctx.owner,
            DeferredKind::Factory => &ctx.ambient,
        };
        Self {
            container: Arc::downgrade(ctx.container),
            ambient: ScopeRef::capture(&ctx.ambient),
            owner: ScopeRef::capture(owner),
            resolution: ScopeRef::capture(&ctx.resolution),
            request,
            kind,
        }
    }

    pub fn request(&self) -> &ServiceRequest {
        &self.request
    }

    pub fn kind(&self) -> DeferredKind {
        self.kind
    }

    pub(crate) fn resolve(&self) -> DiResult<Option<Instance>> {
        let container = self.container.upgrade().ok_or(DiError::ContainerIsDisposed)?;
        if container.is_disposed() {
            return Err(DiError::ContainerIsDisposed);
        }
        let ctx = ExecContext {
            container: &container,
            ambient: ScopeRef::upgrade(&self.ambient)?,
            owner: ScopeRef::upgrade(&self.owner)?,
            resolution: ScopeRef::upgrade(&self.resolution)?,
        };
        ContainerInner::resolve_in(&ctx, &self.request)
    }

    fn resolve_typed<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let instance = self.resolve()?.ok_or(DiError::UnableToResolveUnknownService {
            service: self.request.service_type().name(),
            key: self.request.service_key().cloned(),
        })?;
        instance
            .downcast::<T>()
            .ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))
    }
}

impl fmt::Debug for DeferredRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRequest")
            .field("request", &self.request)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Resolves `T` on first access and keeps the value.
///
/// Consuming a service through `Lazy` breaks a static dependency cycle; the
/// cycle only fails if the value is accessed while the cycle is still being
/// constructed.
pub struct Lazy<T: ?Sized> {
    request: DeferredRequest,
    value: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
    pub(crate) fn new(request: DeferredRequest) -> Self {
        Self {
            request,
            value: OnceCell::new(),
        }
    }

    pub fn value(&self) -> DiResult<Arc<T>> {
        self.value.get_or_try_init(|| self.request.resolve_typed::<T>()).cloned()
    }

    pub fn is_value_created(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T: ?Sized> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("service", &self.request.request.service_type())
            .field("created", &self.value.get().is_some())
            .finish()
    }
}

/// Resolves `T` each time it is invoked.
pub struct FactoryOf<T: ?Sized> {
    request: DeferredRequest,
    _service: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> FactoryOf<T> {
    pub(crate) fn new(request: DeferredRequest) -> Self {
        Self {
            request,
            _service: PhantomData,
        }
    }

    pub fn create(&self) -> DiResult<Arc<T>> {
        self.request.resolve_typed::<T>()
    }
}

impl<T: ?Sized> Clone for FactoryOf<T> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            _service: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for FactoryOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryOf")
            .field("service", &self.request.request.service_type())
            .finish()
    }
}

/// Handle to the resolution scope opened for an anchor service.
///
/// The container never disposes a resolution scope on its own: the anchor
/// receives this handle and is responsible for calling [`dispose`](Self::dispose).
#[derive(Clone)]
pub struct ResolutionScope {
    data: Arc<ScopeData>,
}

impl ResolutionScope {
    pub(crate) fn new(data: Arc<ScopeData>) -> Self {
        Self { data }
    }

    pub fn id(&self) -> u64 {
        self.data.id()
    }

    pub fn name(&self) -> Option<&ScopeName> {
        self.data.name()
    }

    /// Disposes every instance tracked in the scope, LIFO, once.
    pub fn dispose(&self) {
        self.data.dispose();
    }

    pub async fn dispose_async(&self) {
        self.data.dispose_async().await;
    }

    pub fn is_disposed(&self) -> bool {
        self.data.is_disposed()
    }
}

impl fmt::Debug for ResolutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionScope")
            .field("id", &self.data.id())
            .field("name", &self.data.name())
            .field("disposed", &self.data.is_disposed())
            .finish()
    }
}
