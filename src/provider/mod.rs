//! The container: registration entry point, plan cache owner and root resolver.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::internal::{AsyncDisposer, SyncDisposer};
use crate::key::{ServiceKey, TypeInfo};
use crate::plan::{self, Plan, PlanCache, PlanKey};
use crate::registration::{Injectable, Instance, Registration};
use crate::registry::{Registry, RegistryCell};
use crate::request::ServiceRequest;
use crate::resolution;
use crate::reuse::{Reuse, ScopeName};
use crate::rules::Rules;
use crate::traits::{Resolver, ResolverCore};
use crate::wrappers::{DeferredKind, DeferredRequest};

pub mod context;
pub mod scope;

pub(crate) use context::ExecContext;
pub use context::ResolverContext;
pub use scope::Scope;
pub(crate) use scope::ScopeData;

/// Dependency resolution container.
///
/// Holds immutable [`Rules`], a copy-on-write registry, the compiled plan
/// cache and the singleton scope. Cloning is cheap and shares everything;
/// [`with_rules`](Self::with_rules) derives a container with different rules
/// and its own copies of the registry and the plan cache.
///
/// # Thread Safety
///
/// Registry reads and plan lookups are lock-free. Registration serializes on
/// a writer lock. Concurrent first resolutions of a singleton construct it
/// exactly once.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{Arguments, Container, DiResult, Injectable, Parameter, Registration, Resolver, Reuse};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// impl Injectable for Database {
///     fn construct(_: &mut Arguments) -> DiResult<Self> {
///         Ok(Database { url: "postgres://localhost".to_string() })
///     }
/// }
///
/// struct UserService { db: Arc<Database> }
/// impl Injectable for UserService {
///     fn parameters() -> Vec<Parameter> { vec![Parameter::of::<Database>("db")] }
///     fn construct(args: &mut Arguments) -> DiResult<Self> {
///         Ok(UserService { db: args.get()? })
///     }
/// }
///
/// let container = Container::new();
/// container.register_singleton::<Database>().unwrap();
/// container.register_transient::<UserService>().unwrap();
///
/// let a = container.resolve::<UserService>().unwrap();
/// let b = container.resolve::<UserService>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// assert!(Arc::ptr_eq(&a.db, &b.db));
/// assert_eq!(a.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    rules: Rules,
    registry: RegistryCell,
    plans: Arc<PlanCache>,
    singletons: Arc<ScopeData>,
    /// Creator of the singleton scope; `None` when this container created it.
    singleton_owner: Option<Weak<ContainerInner>>,
    disposed: AtomicBool,
}

impl ContainerInner {
    pub(crate) fn singletons(&self) -> &Arc<ScopeData> {
        &self.singletons
    }

    /// Resolves `request` with the scopes carried by `ctx`.
    pub(crate) fn resolve_in(ctx: &ExecContext<'_>, request: &ServiceRequest) -> DiResult<Option<Instance>> {
        let inner = ctx.container;
        if inner.is_disposed() {
            return Err(DiError::ContainerIsDisposed);
        }

        let observers = inner.rules.observers();
        let started = (!observers.is_empty()).then(Instant::now);
        for observer in observers {
            observer.resolving(request);
        }

        let result = match inner.plan_for(request) {
            Ok(Some(plan)) => plan.execute(ctx).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        if let Some(started) = started {
            match &result {
                Ok(_) => observers.iter().for_each(|o| o.resolved(request, started.elapsed())),
                Err(e) => observers.iter().for_each(|o| o.failed(request, e)),
            }
        }
        result
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || self.singletons.is_disposed()
    }

    /// Marks this container disposed; true for the first caller only.
    fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    /// Only the creator of the singleton scope disposes it, or any container
    /// sharing it once the creator is gone.
    fn owns_singletons(&self) -> bool {
        match &self.singleton_owner {
            None => true,
            Some(owner) => owner.strong_count() == 0,
        }
    }

    /// Derived container sharing the singleton scope without owning it.
    fn derive(this: &Arc<ContainerInner>, rules: Rules, plans: PlanCache) -> ContainerInner {
        let owner = match &this.singleton_owner {
            None => Arc::downgrade(this),
            Some(owner) => owner.clone(),
        };
        ContainerInner {
            rules,
            registry: RegistryCell::new(Registry::clone(&this.registry.load())),
            plans: Arc::new(plans),
            singletons: this.singletons.clone(),
            singleton_owner: Some(owner),
            disposed: AtomicBool::new(false),
        }
    }

    /// Cached plan for `request`, compiling it on a miss.
    fn plan_for(&self, request: &ServiceRequest) -> DiResult<Option<Arc<Plan>>> {
        let key = PlanKey::of(request);
        if let Some(plan) = self.plans.get(&key) {
            return Ok(Some(plan));
        }

        let registry = self.registry.load();
        let tree = resolution::resolve(&registry, &self.rules, request)?;
        let Some(plan) = plan::compile(request, tree, &self.rules)? else {
            tracing::trace!(service = %request, "unresolved; returning default");
            return Ok(None);
        };

        let plan = self.plans.insert(key, plan);
        tracing::debug!(fingerprint = %plan.fingerprint(), "compiled resolution plan");
        for observer in self.rules.observers() {
            observer.plan_compiled(plan.fingerprint());
        }
        Ok(Some(plan))
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        // Last owner of the singleton scope releases it
        if Arc::strong_count(&self.singletons) == 1 {
            self.singletons.dispose();
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with(Rules::default())
    }

    /// Creates an empty container governed by `rules`.
    pub fn with(rules: Rules) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                rules,
                registry: RegistryCell::new(Registry::default()),
                plans: Arc::new(PlanCache::default()),
                singletons: ScopeData::singleton(),
                singleton_owner: None,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<ContainerInner> {
        &self.inner
    }

    pub fn rules(&self) -> &Rules {
        &self.inner.rules
    }

    /// Derives a container with rules transformed by `configure`.
    ///
    /// The new container gets a copy of the current registrations and of the
    /// compiled plans, and shares the singleton scope without owning it.
    /// Plans compiled under the old rules stay cached in the copy; call
    /// [`without_cache`](Self::without_cache) when the change affects
    /// resolution. Nothing the derived container compiles, registers or
    /// disposes is visible from this one.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_resolver::{Container, IfAlreadyRegistered};
    ///
    /// let container = Container::new();
    /// let keeping = container.with_rules(|r| r.with_default_if_already_registered(IfAlreadyRegistered::Keep));
    ///
    /// assert_eq!(container.rules().default_if_already_registered(), IfAlreadyRegistered::AppendNotKeyed);
    /// assert_eq!(keeping.rules().default_if_already_registered(), IfAlreadyRegistered::Keep);
    /// ```
    pub fn with_rules<F>(&self, configure: F) -> Container
    where
        F: FnOnce(&Rules) -> Rules,
    {
        let rules = configure(&self.inner.rules);
        Self {
            inner: Arc::new(ContainerInner::derive(&self.inner, rules, self.inner.plans.snapshot())),
        }
    }

    /// Derives a container identical to this one but with an empty plan cache.
    pub fn without_cache(&self) -> Container {
        Self {
            inner: Arc::new(ContainerInner::derive(&self.inner, self.inner.rules.clone(), PlanCache::default())),
        }
    }

    /// Drops every compiled plan of this container and its clones.
    pub fn clear_cache(&self) {
        self.inner.plans.clear();
        tracing::debug!("plan cache cleared");
    }

    pub fn cached_plans(&self) -> usize {
        self.inner.plans.len()
    }

    /// Stores a registration, applying the effective `IfAlreadyRegistered` policy.
    pub fn register<S: ?Sized + Send + Sync + 'static>(&self, registration: Registration<S>) -> DiResult<()> {
        let policy = registration.policy();
        self.inner
            .registry
            .register(registration.into_factory(), policy, &self.inner.rules)
            .map(|_| ())
    }

    pub fn register_singleton<T: Injectable>(&self) -> DiResult<()> {
        self.register(Registration::<T>::new().reuse(Reuse::Singleton))
    }

    pub fn register_scoped<T: Injectable>(&self) -> DiResult<()> {
        self.register(Registration::<T>::new().reuse(Reuse::scoped()))
    }

    pub fn register_transient<T: Injectable>(&self) -> DiResult<()> {
        self.register(Registration::<T>::new())
    }

    pub fn register_instance<S: ?Sized + Send + Sync + 'static>(&self, instance: Arc<S>) -> DiResult<()> {
        self.register(Registration::instance(instance))
    }

    pub fn register_delegate<S, F>(&self, reuse: Reuse, factory: F) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: for<'a> Fn(&ResolverContext<'a>) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        self.register(Registration::<S>::delegate(factory).reuse(reuse))
    }

    pub fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        self.inner.registry.load().is_registered(TypeInfo::of::<S>(), None)
    }

    pub fn is_registered_keyed<S: ?Sized + 'static>(&self, key: impl Into<ServiceKey>) -> bool {
        self.inner
            .registry
            .load()
            .is_registered(TypeInfo::of::<S>(), Some(&key.into()))
    }

    /// Descriptors of every stored registration.
    pub fn registrations(&self) -> Vec<ServiceDescriptor> {
        self.inner.registry.load().descriptors()
    }

    /// Opens an ambient scope.
    pub fn open_scope(&self, name: Option<ScopeName>) -> Scope {
        Scope::new(self.clone(), None, name)
    }

    /// Compiled plan for `request`, compiling and caching it if needed.
    ///
    /// Returns `None` when the request is unresolved with `ReturnDefault`.
    pub fn plan(&self, request: &ServiceRequest) -> DiResult<Option<Arc<Plan>>> {
        self.inner.plan_for(request)
    }

    /// Disposes singletons, LIFO, once. Later resolutions fail.
    ///
    /// A container derived with [`with_rules`](Self::with_rules) or
    /// [`without_cache`](Self::without_cache) only marks itself disposed
    /// while the container that created the singletons is alive.
    pub fn dispose(&self) {
        if self.inner.mark_disposed() && self.inner.owns_singletons() {
            self.inner.singletons.dispose();
        }
    }

    /// Disposes singletons, awaiting async disposers.
    pub async fn dispose_async(&self) {
        if self.inner.mark_disposed() && self.inner.owns_singletons() {
            self.inner.singletons.dispose_async().await;
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Container Debug ===\n");
        s.push_str(&format!("Rules: {:?}\n", self.inner.rules));
        s.push_str("Registrations:\n");
        for d in self.registrations() {
            let key = d.service_key.as_ref().map(|k| format!(" [{}]", k)).unwrap_or_default();
            let implementation = d.implementation_type.map(|t| t.name()).unwrap_or("<delegate>");
            s.push_str(&format!("  {}{} <- {} ({})\n", d.type_name(), key, implementation, d.reuse));
        }
        s.push_str(&format!("Cached plans: {}\n", self.cached_plans()));
        s
    }
}

impl ResolverCore for Container {
    fn resolve_any(&self, request: &ServiceRequest) -> DiResult<Option<Instance>> {
        ContainerInner::resolve_in(&ExecContext::root(&self.inner), request)
    }

    fn defer(&self, request: ServiceRequest, kind: DeferredKind) -> DiResult<DeferredRequest> {
        Ok(DeferredRequest::capture(request, kind, &ExecContext::root(&self.inner)))
    }

    // Disposers registered on the container belong to the singleton scope
    fn push_sync_disposer(&self, f: SyncDisposer) {
        self.inner.singletons.track(f);
    }

    fn push_async_disposer(&self, f: AsyncDisposer) {
        self.inner.singletons.track_async(f);
    }
}

impl Resolver for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("rules", &self.inner.rules)
            .field("registrations", &self.inner.registry.load().len())
            .field("cached_plans", &self.inner.plans.len())
            .field("singletons", &self.inner.singletons)
            .finish()
    }
}
