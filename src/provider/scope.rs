//! Scopes: instance caches with owned disposal.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::internal::{AsyncDisposer, ConstructionGuard, DisposeBag, SyncDisposer};
use crate::registration::{FactoryId, Instance};
use crate::request::ServiceRequest;
use crate::reuse::ScopeName;
use crate::traits::{Resolver, ResolverCore};
use crate::wrappers::{DeferredKind, DeferredRequest};

use super::{Container, ContainerInner, ExecContext};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared state of a scope: memoized instances and disposal hooks.
pub(crate) struct ScopeData {
    id: u64,
    name: Option<ScopeName>,
    parent: Option<Weak<ScopeData>>,
    // One cell per factory; the cell serializes first construction
    slots: DashMap<FactoryId, Arc<OnceCell<Instance>>>,
    disposables: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl ScopeData {
    fn new(name: Option<ScopeName>, parent: Option<&Arc<ScopeData>>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            parent: parent.map(Arc::downgrade),
            slots: DashMap::new(),
            disposables: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
        })
    }

    pub(crate) fn singleton() -> Arc<Self> {
        Self::new(None, None)
    }

    pub(crate) fn child(parent: Option<&Arc<ScopeData>>, name: Option<ScopeName>) -> Arc<Self> {
        Self::new(name, parent)
    }

    pub(crate) fn resolution(parent: Option<&Arc<ScopeData>>, name: ScopeName) -> Arc<Self> {
        Self::new(Some(name), parent)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn name(&self) -> Option<&ScopeName> {
        self.name.as_ref()
    }

    pub(crate) fn parent(&self) -> Option<Arc<ScopeData>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// The scope itself followed by its live ancestors.
    pub(crate) fn ancestry(this: Arc<ScopeData>) -> impl Iterator<Item = Arc<ScopeData>> {
        std::iter::successors(Some(this), |scope| scope.parent())
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_live(&self) -> DiResult<()> {
        if self.is_disposed() {
            return Err(DiError::ScopeIsDisposed { id: self.id });
        }
        Ok(())
    }

    /// Returns the instance for `factory`, constructing it at most once.
    ///
    /// Concurrent first calls block on the slot until the winner finishes.
    /// A failed construction leaves the slot empty.
    pub(crate) fn get_or_create<F>(&self, factory: FactoryId, name: &'static str, create: F) -> DiResult<Instance>
    where
        F: FnOnce() -> DiResult<Instance>,
    {
        self.ensure_live()?;
        // Clone the cell out so the map shard is not held during construction
        let cell = self.slots.entry(factory).or_default().value().clone();
        if let Some(instance) = cell.get() {
            return Ok(instance.clone());
        }

        let _guard = ConstructionGuard::enter(factory, name)?;
        cell.get_or_try_init(create).cloned()
    }

    /// Adds a disposal hook; runs it immediately if the scope is already disposed.
    pub(crate) fn track(&self, hook: SyncDisposer) {
        let mut bag = self.disposables.lock();
        if self.is_disposed() {
            drop(bag);
            tracing::warn!(scope = self.id, "tracking into a disposed scope; disposing immediately");
            hook();
            return;
        }
        bag.push_sync(hook);
    }

    pub(crate) fn track_async(&self, hook: AsyncDisposer) {
        let mut bag = self.disposables.lock();
        if self.is_disposed() {
            tracing::warn!(scope = self.id, "async disposer tracked into a disposed scope; dropped");
            return;
        }
        bag.push_async(hook);
    }

    fn begin_dispose(&self) -> Option<DisposeBag> {
        let mut bag = self.disposables.lock();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(std::mem::take(&mut *bag))
    }

    /// Runs sync disposal hooks LIFO, exactly once.
    pub(crate) fn dispose(&self) {
        let Some(mut bag) = self.begin_dispose() else {
            return;
        };
        let count = bag.len();
        let skipped = bag.run_all_sync_reverse();
        if skipped > 0 {
            tracing::warn!(
                scope = self.id,
                skipped,
                "scope disposed synchronously; async disposers were not run"
            );
        }
        self.slots.clear();
        tracing::debug!(scope = self.id, name = ?self.name, disposed = count - skipped, "scope disposed");
    }

    /// Runs every disposal hook LIFO, awaiting async ones, exactly once.
    pub(crate) async fn dispose_async(&self) {
        let Some(mut bag) = self.begin_dispose() else {
            return;
        };
        let count = bag.len();
        bag.run_all_reverse().await;
        self.slots.clear();
        tracing::debug!(scope = self.id, name = ?self.name, disposed = count, "scope disposed");
    }

    pub(crate) fn tracked(&self) -> usize {
        self.disposables.lock().len()
    }
}

impl fmt::Debug for ScopeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeData")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("instances", &self.slots.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// An ambient scope opened by the caller.
///
/// Services with [`Reuse::Scoped`](crate::Reuse::Scoped) are cached per scope
/// and disposed, in reverse order of creation, when the scope is disposed.
/// Dropping the handle disposes the scope.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{Arguments, Container, DiResult, Injectable, Registration, Resolver, Reuse};
/// use std::sync::Arc;
///
/// struct DatabaseConnection;
/// impl Injectable for DatabaseConnection {
///     fn construct(_: &mut Arguments) -> DiResult<Self> { Ok(DatabaseConnection) }
/// }
///
/// let container = Container::new();
/// container.register(Registration::<DatabaseConnection>::new().reuse(Reuse::scoped_to("request"))).unwrap();
///
/// let request = container.open_scope(Some("request".into()));
/// let nested = request.open_scope(None);
///
/// // Scoped to the named outer scope, shared with nested scopes
/// let a = request.resolve::<DatabaseConnection>().unwrap();
/// let b = nested.resolve::<DatabaseConnection>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub struct Scope {
    container: Container,
    data: Arc<ScopeData>,
}

impl Scope {
    pub(crate) fn new(container: Container, parent: Option<&Arc<ScopeData>>, name: Option<ScopeName>) -> Self {
        let data = ScopeData::child(parent, name);
        tracing::debug!(scope = data.id(), name = ?data.name(), "scope opened");
        Self { container, data }
    }

    pub fn id(&self) -> u64 {
        self.data.id()
    }

    pub fn name(&self) -> Option<&ScopeName> {
        self.data.name()
    }

    /// Opens a nested scope; named lookups walk outward through this one.
    pub fn open_scope(&self, name: Option<ScopeName>) -> Scope {
        Scope::new(self.container.clone(), Some(&self.data), name)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Disposes instances owned by the scope, LIFO, once.
    pub fn dispose(&self) {
        self.data.dispose();
    }

    /// Disposes instances owned by the scope, awaiting async disposers.
    pub async fn dispose_async(&self) {
        self.data.dispose_async().await;
    }

    pub fn is_disposed(&self) -> bool {
        self.data.is_disposed()
    }

    /// Number of disposal hooks currently tracked.
    pub fn tracked_disposables(&self) -> usize {
        self.data.tracked()
    }

    fn exec(&self) -> DiResult<ExecContext<'_>> {
        self.data.ensure_live()?;
        Ok(ExecContext::in_scope(self.container.inner(), &self.data))
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, request: &ServiceRequest) -> DiResult<Option<Instance>> {
        ContainerInner::resolve_in(&self.exec()?, request)
    }

    fn defer(&self, request: ServiceRequest, kind: DeferredKind) -> DiResult<DeferredRequest> {
        Ok(DeferredRequest::capture(request, kind, &self.exec()?))
    }

    fn push_sync_disposer(&self, f: SyncDisposer) {
        self.data.track(f);
    }

    fn push_async_disposer(&self, f: AsyncDisposer) {
        self.data.track_async(f);
    }
}

impl Resolver for Scope {}

impl Drop for Scope {
    fn drop(&mut self) {
        self.data.dispose();
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.data, f)
    }
}
