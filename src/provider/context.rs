//! Execution context threaded through plan execution, and the resolver
//! handed to delegate factories.

use std::sync::Arc;

use crate::error::DiResult;
use crate::internal::{AsyncDisposer, SyncDisposer};
use crate::key::{ServiceKey, TypeInfo};
use crate::registration::Instance;
use crate::request::ServiceRequest;
use crate::reuse::ScopeName;
use crate::traits::{Resolver, ResolverCore};
use crate::wrappers::{DeferredKind, DeferredRequest};

use super::{ContainerInner, ScopeData};

/// Scopes in effect while a plan runs.
///
/// - `ambient`: the scope opened by the caller, used for `Scoped` reuse
/// - `owner`: where disposable transients are tracked
/// - `resolution`: innermost resolution scope, used for `InResolutionScopeOf`
#[derive(Clone)]
pub(crate) struct ExecContext<'a> {
    pub(crate) container: &'a Arc<ContainerInner>,
    pub(crate) ambient: Option<Arc<ScopeData>>,
    pub(crate) owner: Option<Arc<ScopeData>>,
    pub(crate) resolution: Option<Arc<ScopeData>>,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn root(container: &'a Arc<ContainerInner>) -> Self {
        Self {
            container,
            ambient: None,
            owner: None,
            resolution: None,
        }
    }

    pub(crate) fn in_scope(container: &'a Arc<ContainerInner>, scope: &Arc<ScopeData>) -> Self {
        Self {
            container,
            ambient: Some(scope.clone()),
            owner: Some(scope.clone()),
            resolution: None,
        }
    }

    /// Singletons are owned by the singleton scope and never see caller scopes.
    pub(crate) fn for_singleton(&self) -> Self {
        Self {
            container: self.container,
            ambient: None,
            owner: Some(self.container.singletons().clone()),
            resolution: None,
        }
    }

    pub(crate) fn with_ambient(&self, scope: Arc<ScopeData>) -> Self {
        Self {
            container: self.container,
            ambient: Some(scope.clone()),
            owner: Some(scope),
            resolution: self.resolution.clone(),
        }
    }

    pub(crate) fn with_owner(&self, scope: Arc<ScopeData>) -> Self {
        Self {
            owner: Some(scope),
            ..self.clone()
        }
    }

    pub(crate) fn with_resolution(&self, scope: Arc<ScopeData>) -> Self {
        Self {
            resolution: Some(scope),
            ..self.clone()
        }
    }

    /// Nearest ambient scope with `name`, or the current one when unnamed.
    pub(crate) fn find_ambient(&self, name: Option<&ScopeName>) -> Option<Arc<ScopeData>> {
        let current = self.ambient.clone()?;
        match name {
            None => Some(current),
            Some(name) => ScopeData::ancestry(current).find(|scope| scope.name() == Some(name)),
        }
    }

    /// Nearest resolution scope opened by `anchor` (any anchor when `None`).
    pub(crate) fn find_resolution(&self, anchor: Option<TypeInfo>, key: Option<&ServiceKey>) -> Option<Arc<ScopeData>> {
        let current = self.resolution.clone()?;
        ScopeData::ancestry(current).find(|scope| match (anchor, scope.name()) {
            (None, _) => true,
            (Some(anchor), Some(ScopeName::Resolution { service, key: scope_key })) => {
                *service == anchor && (key.is_none() || key == scope_key.as_ref())
            }
            _ => false,
        })
    }
}

/// Resolver handed to delegate factories.
///
/// Resolves with the scopes of the resolution in progress; disposers
/// registered through it are tracked by the scope that owns the instance
/// being built.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{Container, Registration, Resolver, Reuse};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let container = Container::new();
/// container.register(Registration::instance(Arc::new(Database {
///     url: "postgres://localhost".to_string(),
/// }))).unwrap();
/// container.register(Registration::<UserService>::delegate(|ctx| {
///     Ok(Arc::new(UserService { db: ctx.resolve::<Database>()? }))
/// })).unwrap();
///
/// let service = container.resolve::<UserService>().unwrap();
/// assert_eq!(service.db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    exec: &'a ExecContext<'a>,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(exec: &'a ExecContext<'a>) -> Self {
        Self { exec }
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_any(&self, request: &ServiceRequest) -> DiResult<Option<Instance>> {
        ContainerInner::resolve_in(self.exec, request)
    }

    fn defer(&self, request: ServiceRequest, kind: DeferredKind) -> DiResult<DeferredRequest> {
        Ok(DeferredRequest::capture(request, kind, self.exec))
    }

    fn push_sync_disposer(&self, f: SyncDisposer) {
        match &self.exec.owner {
            Some(owner) => owner.track(f),
            None => tracing::trace!("disposer registered without an owning scope; not tracked"),
        }
    }

    fn push_async_disposer(&self, f: AsyncDisposer) {
        match &self.exec.owner {
            Some(owner) => owner.track_async(f),
            None => tracing::trace!("async disposer registered without an owning scope; not tracked"),
        }
    }
}

impl Resolver for ResolverContext<'_> {}
