//! Service registrations: the factory descriptors stored in the registry.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::arguments::Arguments;
use crate::capabilities::{Dependency, Parameter};
use crate::error::DiResult;
use crate::internal::SyncDisposer;
use crate::key::{Metadata, ServiceKey, TypeInfo};
use crate::provider::ResolverContext;
use crate::reuse::Reuse;
use crate::rules::Item;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// A resolved service value.
///
/// Holds an `Arc<S>` for the service type `S` it was produced for, so trait
/// objects and concrete types share one representation.
#[derive(Clone)]
pub struct Instance {
    value: AnyArc,
    service_type: TypeInfo,
}

impl Instance {
    pub fn new<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
        Self {
            value: Arc::new(value),
            service_type: TypeInfo::of::<S>(),
        }
    }

    /// Returns the typed service if the instance was produced for `S`.
    pub fn downcast<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.value.downcast_ref::<Arc<S>>().cloned()
    }

    pub fn service_type(&self) -> TypeInfo {
        self.service_type
    }

    /// True when both instances wrap the same allocation.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("service_type", &self.service_type).finish()
    }
}

/// Types the container can construct from declared parameters.
///
/// `parameters` describes the constructor dependencies in order; the
/// container resolves them and hands them to `construct` as positional
/// [`Arguments`]. Types owning releasable resources return a disposer so the
/// container can decide, at registration time, whether it will be able to
/// release them.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Injectable, Parameter, Arguments, DiResult, Dispose};
/// use std::sync::Arc;
///
/// struct Database;
/// impl Injectable for Database {
///     fn construct(_: &mut Arguments) -> DiResult<Self> { Ok(Database) }
/// }
///
/// struct Connection { db: Arc<Database> }
/// impl Dispose for Connection {
///     fn dispose(&self) { /* close socket */ }
/// }
/// impl Injectable for Connection {
///     fn parameters() -> Vec<Parameter> {
///         vec![Parameter::of::<Database>("db")]
///     }
///     fn construct(args: &mut Arguments) -> DiResult<Self> {
///         Ok(Connection { db: args.get()? })
///     }
///     fn disposer() -> Option<fn(&Self)> {
///         Some(<Self as Dispose>::dispose)
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Constructor dependencies, in argument order.
    fn parameters() -> Vec<Parameter> {
        Vec::new()
    }

    /// Builds the value from resolved arguments.
    fn construct(args: &mut Arguments) -> DiResult<Self>;

    /// Release hook for instances owning resources.
    fn disposer() -> Option<fn(&Self)> {
        None
    }
}

/// Policy applied when a registration with the same identity already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum IfAlreadyRegistered {
    /// Append unkeyed registrations; reject duplicate keys.
    #[default]
    AppendNotKeyed,
    /// Reject the new registration.
    Throw,
    /// Keep the existing registrations and drop the new one.
    Keep,
    /// Replace every existing registration of the identity.
    Replace,
    /// Replace registrations with the same implementation type, append otherwise.
    ReplaceMany,
}

impl std::str::FromStr for IfAlreadyRegistered {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "append_not_keyed" | "appendnotkeyed" => Ok(Self::AppendNotKeyed),
            "throw" => Ok(Self::Throw),
            "keep" => Ok(Self::Keep),
            "replace" => Ok(Self::Replace),
            "replace_many" | "replacemany" => Ok(Self::ReplaceMany),
            other => Err(format!("unknown if-already-registered policy '{}'", other)),
        }
    }
}

/// Per-registration flags.
#[derive(Debug, Clone, Default)]
pub struct Setup {
    /// Accept a transient disposable the container will not dispose.
    pub allow_disposable_transient: bool,
    /// Track this transient disposable in the scope current at creation time.
    pub track_disposable_transient: bool,
    /// Resolve this service through a nested resolution call when it is a dependency.
    pub as_resolution_call: bool,
    /// Open a resolution scope around the construction of this service.
    pub open_resolution_scope: bool,
    /// Metadata consumers can select on.
    pub metadata: Option<Metadata>,
}

impl Setup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_disposable_transient(mut self) -> Self {
        self.allow_disposable_transient = true;
        self
    }

    pub fn track_disposable_transient(mut self) -> Self {
        self.track_disposable_transient = true;
        self
    }

    pub fn as_resolution_call(mut self) -> Self {
        self.as_resolution_call = true;
        self
    }

    pub fn open_resolution_scope(mut self) -> Self {
        self.open_resolution_scope = true;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Identity of a stored factory; keys singleton and scoped instance caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactoryId(u64);

impl FactoryId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        FactoryId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FactoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "factory#{}", self.0)
    }
}

/// Value produced by a construction, with its release hook if any.
pub(crate) struct Created {
    pub(crate) instance: Instance,
    pub(crate) disposer: Option<SyncDisposer>,
}

pub(crate) type ConstructFn = Arc<dyn Fn(&mut Arguments) -> DiResult<Created> + Send + Sync>;
pub(crate) type DelegateFn = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<Instance> + Send + Sync>;

/// Implementation type with its declared constructor parameters.
#[derive(Clone)]
pub struct Implementation {
    type_info: TypeInfo,
    parameters: Arc<[Parameter]>,
    arguments: Vec<(usize, Item)>,
    disposable: bool,
    pub(crate) construct: ConstructFn,
}

impl Implementation {
    fn of<I, S>(cast: fn(Arc<I>) -> Arc<S>) -> Self
    where
        I: Injectable,
        S: ?Sized + Send + Sync + 'static,
    {
        let construct = move |args: &mut Arguments| -> DiResult<Created> {
            let value = Arc::new(I::construct(args)?);
            let disposer = I::disposer().map(|dispose| {
                let owned = value.clone();
                Box::new(move || dispose(&owned)) as SyncDisposer
            });
            Ok(Created {
                instance: Instance::new(cast(value)),
                disposer,
            })
        };

        Self {
            type_info: TypeInfo::of::<I>(),
            parameters: I::parameters().into(),
            arguments: Vec::new(),
            disposable: I::disposer().is_some(),
            construct: Arc::new(construct),
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn is_disposable(&self) -> bool {
        self.disposable
    }

    /// Explicit argument value registered for the parameter at `index`.
    pub fn argument(&self, index: usize) -> Option<&Item> {
        self.arguments.iter().find(|(i, _)| *i == index).map(|(_, item)| item)
    }

    /// Dependencies as declared, with registered argument values applied.
    pub fn declared_dependencies(&self) -> Vec<Dependency> {
        self.parameters
            .iter()
            .enumerate()
            .map(|(index, parameter)| match self.argument(index) {
                Some(item) => Dependency::from(parameter).with_value(item.clone()),
                None => Dependency::from(parameter),
            })
            .collect()
    }
}

#[derive(Clone)]
pub(crate) enum FactoryKind {
    Implementation(Implementation),
    Delegate(DelegateFn),
    Instance(Instance),
}

/// A registered producer of a service.
///
/// Factories are immutable once stored; the registry keeps them in
/// registration order per `(service type, service key)`.
pub struct Factory {
    id: FactoryId,
    service_type: TypeInfo,
    service_key: Option<ServiceKey>,
    pub(crate) kind: FactoryKind,
    reuse: Reuse,
    setup: Setup,
}

impl Factory {
    pub fn id(&self) -> FactoryId {
        self.id
    }

    pub fn service_type(&self) -> TypeInfo {
        self.service_type
    }

    pub fn service_key(&self) -> Option<&ServiceKey> {
        self.service_key.as_ref()
    }

    pub fn reuse(&self) -> &Reuse {
        &self.reuse
    }

    /// Copy with a different reuse and a fresh identity.
    pub(crate) fn with_reuse(&self, reuse: Reuse) -> Factory {
        Factory {
            id: FactoryId::next(),
            service_type: self.service_type,
            service_key: self.service_key.clone(),
            kind: self.kind.clone(),
            reuse,
            setup: self.setup.clone(),
        }
    }

    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.setup.metadata.as_ref()
    }

    pub fn implementation(&self) -> Option<&Implementation> {
        match &self.kind {
            FactoryKind::Implementation(implementation) => Some(implementation),
            _ => None,
        }
    }

    pub fn implementation_type(&self) -> Option<TypeInfo> {
        self.implementation().map(Implementation::type_info)
    }

    pub fn is_disposable(&self) -> bool {
        self.implementation().map(Implementation::is_disposable).unwrap_or(false)
    }

    pub(crate) fn describe_kind(&self) -> &'static str {
        match &self.kind {
            FactoryKind::Implementation(_) => "implementation",
            FactoryKind::Delegate(_) => "delegate",
            FactoryKind::Instance(_) => "instance",
        }
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("id", &self.id)
            .field("service_type", &self.service_type)
            .field("service_key", &self.service_key)
            .field("kind", &self.describe_kind())
            .field("implementation", &self.implementation_type())
            .field("reuse", &self.reuse)
            .finish()
    }
}

/// Builder for a service registration.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Container, Registration, Resolver, Reuse, Injectable, Arguments, DiResult};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
///
/// struct English;
/// impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
/// impl Injectable for English {
///     fn construct(_: &mut Arguments) -> DiResult<Self> { Ok(English) }
/// }
///
/// let container = Container::new();
/// container.register(
///     Registration::<dyn Greeter>::implemented_by::<English>(|e| e as Arc<dyn Greeter>)
///         .reuse(Reuse::Singleton),
/// ).unwrap();
///
/// let greeter = container.resolve::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
pub struct Registration<S: ?Sized> {
    service_type: TypeInfo,
    kind: FactoryKind,
    key: Option<ServiceKey>,
    reuse: Reuse,
    setup: Setup,
    if_already_registered: Option<IfAlreadyRegistered>,
    _service: PhantomData<fn() -> Arc<S>>,
}

impl<S: Injectable> Registration<S> {
    /// Registers `S` as its own implementation.
    pub fn new() -> Self {
        Self::implemented_by::<S>(|s| s)
    }
}

impl<S: Injectable> Default for Registration<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized + Send + Sync + 'static> Registration<S> {
    fn with_kind(kind: FactoryKind, reuse: Reuse) -> Self {
        Self {
            service_type: TypeInfo::of::<S>(),
            kind,
            key: None,
            reuse,
            setup: Setup::default(),
            if_already_registered: None,
            _service: PhantomData,
        }
    }

    /// Registers implementation `I` for service `S`; `cast` performs the unsizing.
    pub fn implemented_by<I: Injectable>(cast: fn(Arc<I>) -> Arc<S>) -> Self {
        Self::with_kind(FactoryKind::Implementation(Implementation::of::<I, S>(cast)), Reuse::Transient)
    }

    /// Registers a delegate that resolves its own dependencies at invocation time.
    pub fn delegate<F>(factory: F) -> Self
    where
        F: for<'a> Fn(&ResolverContext<'a>) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        let ctor = move |ctx: &ResolverContext<'_>| -> DiResult<Instance> { factory(ctx).map(Instance::new) };
        Self::with_kind(FactoryKind::Delegate(Arc::new(ctor)), Reuse::Transient)
    }

    /// Registers a pre-built instance, reused as a singleton.
    pub fn instance(value: Arc<S>) -> Self {
        Self::with_kind(FactoryKind::Instance(Instance::new(value)), Reuse::Singleton)
    }

    pub fn reuse(mut self, reuse: Reuse) -> Self {
        self.reuse = reuse;
        self
    }

    pub fn key(mut self, key: impl Into<ServiceKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn setup(mut self, setup: Setup) -> Self {
        self.setup = setup;
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.setup.metadata = Some(metadata);
        self
    }

    pub fn if_already_registered(mut self, policy: IfAlreadyRegistered) -> Self {
        self.if_already_registered = Some(policy);
        self
    }

    /// Supplies a constant for the constructor parameter at `index`.
    ///
    /// Ignored for delegate and instance registrations.
    pub fn with_argument<T: Send + Sync + 'static>(mut self, index: usize, value: T) -> Self {
        if let FactoryKind::Implementation(implementation) = &mut self.kind {
            implementation.arguments.retain(|(i, _)| *i != index);
            implementation.arguments.push((index, Item::new(value)));
        }
        self
    }

    pub(crate) fn policy(&self) -> Option<IfAlreadyRegistered> {
        self.if_already_registered
    }

    /// Finalizes the registration into an immutable factory.
    pub fn into_factory(self) -> Arc<Factory> {
        Arc::new(Factory {
            id: FactoryId::next(),
            service_type: self.service_type,
            service_key: self.key,
            kind: self.kind,
            reuse: self.reuse,
            setup: self.setup,
        })
    }
}
