//! Immutable resolution rules.
//!
//! Every `with_*` / `without_*` call returns a modified copy; a container
//! built from a copy never affects the original.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::capabilities::{CapabilityProvider, DeclaredParameters};
use crate::error::{DiError, DiResult};
use crate::key::TypeInfo;
use crate::observer::ResolutionObserver;
use crate::registration::{Factory, IfAlreadyRegistered, Instance};
use crate::request::Request;

/// A constant value supplied to a constructor parameter.
#[derive(Clone)]
pub struct Item {
    value: Arc<dyn Any + Send + Sync>,
    type_info: TypeInfo,
}

impl Item {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_info: TypeInfo::of::<T>(),
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    fn shared<T: Send + Sync + 'static>(&self) -> Option<Instance> {
        self.value.clone().downcast::<T>().ok().map(Instance::new)
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item<{}>", self.type_info)
    }
}

/// A constant in a form a compiled plan can embed.
#[derive(Clone)]
pub struct Literal {
    make: Arc<dyn Fn() -> Instance + Send + Sync>,
    description: String,
}

impl Literal {
    /// A literal rebuilt by `make` each time the plan runs.
    pub fn of<T, F>(make: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            make: Arc::new(move || Instance::new(Arc::new(make()))),
            description: format!("literal {}", std::any::type_name::<T>()),
        }
    }

    fn shared(instance: Instance) -> Self {
        Self {
            description: format!("constant {}", instance.service_type()),
            make: Arc::new(move || instance.clone()),
        }
    }

    pub(crate) fn produce(&self) -> Instance {
        (self.make)()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

macro_rules! primitive_literal {
    ($item:expr, $($ty:ty),* $(,)?) => {
        $(
            if $item.type_info().is::<$ty>() {
                return $item.shared::<$ty>().map(Literal::shared);
            }
        )*
    };
}

fn primitive_literal(item: &Item) -> Option<Literal> {
    primitive_literal!(
        item, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, String,
        &'static str,
    );
    None
}

type ItemToLiteralFn = dyn Fn(&Item) -> Option<Literal> + Send + Sync;
type SelectorFn = dyn Fn(&Request<'_>, &[Arc<Factory>]) -> Option<Arc<Factory>> + Send + Sync;
type UnknownFn = dyn Fn(&Request<'_>) -> Option<Arc<Factory>> + Send + Sync;

/// Picks one factory out of the candidates for a request.
///
/// Returning `None` with more than one candidate is reported as
/// `AmbiguousRegistrations`; with zero or one candidate the request's
/// unresolved policy applies.
#[derive(Clone)]
pub struct FactorySelector(Arc<SelectorFn>);

impl FactorySelector {
    pub fn new<F>(select: F) -> Self
    where
        F: Fn(&Request<'_>, &[Arc<Factory>]) -> Option<Arc<Factory>> + Send + Sync + 'static,
    {
        Self(Arc::new(select))
    }

    /// Selects the only candidate; several candidates are ambiguous.
    pub fn single() -> Self {
        Self::new(|_, candidates| match candidates {
            [only] => Some(only.clone()),
            _ => None,
        })
    }

    /// Selects the most recently registered candidate.
    pub fn last_registered() -> Self {
        Self::new(|_, candidates| candidates.last().cloned())
    }

    /// Selects the earliest registered candidate.
    pub fn first_registered() -> Self {
        Self::new(|_, candidates| candidates.first().cloned())
    }

    pub(crate) fn select(&self, request: &Request<'_>, candidates: &[Arc<Factory>]) -> Option<Arc<Factory>> {
        (self.0)(request, candidates)
    }
}

impl Default for FactorySelector {
    fn default() -> Self {
        Self::single()
    }
}

/// Fallback consulted when no registration matches a request.
///
/// Equality is by identity, so a resolver added to rules can be removed
/// again with the same handle.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Registration, Rules, UnknownServiceResolver};
///
/// let fallback = UnknownServiceResolver::new(|request| {
///     request.lookup_type().is::<String>().then(|| {
///         Registration::instance(std::sync::Arc::new(String::from("fallback"))).into_factory()
///     })
/// });
///
/// let rules = Rules::default().with_unknown_service_resolvers([fallback.clone()]);
/// assert_eq!(rules.unknown_service_resolvers().len(), 1);
///
/// let rules = rules.without_unknown_service_resolver(&fallback);
/// assert!(rules.unknown_service_resolvers().is_empty());
/// ```
#[derive(Clone)]
pub struct UnknownServiceResolver(Arc<UnknownFn>);

impl UnknownServiceResolver {
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn(&Request<'_>) -> Option<Arc<Factory>> + Send + Sync + 'static,
    {
        Self(Arc::new(resolve))
    }

    pub(crate) fn resolve(&self, request: &Request<'_>) -> Option<Arc<Factory>> {
        (self.0)(request)
    }
}

impl PartialEq for UnknownServiceResolver {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for UnknownServiceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnknownServiceResolver({:p})", Arc::as_ptr(&self.0))
    }
}

/// Policy object consulted by registration, resolution and plan compilation.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{IfAlreadyRegistered, Rules};
///
/// let base = Rules::default();
/// let keep = base.with_default_if_already_registered(IfAlreadyRegistered::Keep);
///
/// assert_eq!(base.default_if_already_registered(), IfAlreadyRegistered::AppendNotKeyed);
/// assert_eq!(keep.default_if_already_registered(), IfAlreadyRegistered::Keep);
/// ```
#[derive(Clone)]
pub struct Rules {
    unknown_service_resolvers: Arc<[UnknownServiceResolver]>,
    factory_selector: FactorySelector,
    default_if_already_registered: IfAlreadyRegistered,
    capabilities: Arc<dyn CapabilityProvider>,
    item_to_literal: Option<Arc<ItemToLiteralFn>>,
    throw_on_registering_disposable_transient: bool,
    track_disposable_transients: bool,
    eager_caching_singletons: bool,
    observers: Arc<[Arc<dyn ResolutionObserver>]>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            unknown_service_resolvers: Arc::new([]),
            factory_selector: FactorySelector::default(),
            default_if_already_registered: IfAlreadyRegistered::default(),
            capabilities: Arc::new(DeclaredParameters),
            item_to_literal: None,
            throw_on_registering_disposable_transient: true,
            track_disposable_transients: false,
            eager_caching_singletons: true,
            observers: Arc::new([]),
        }
    }
}

impl Rules {
    /// Appends resolvers after the existing ones.
    pub fn with_unknown_service_resolvers(&self, resolvers: impl IntoIterator<Item = UnknownServiceResolver>) -> Self {
        let mut list = self.unknown_service_resolvers.to_vec();
        list.extend(resolvers);
        Self {
            unknown_service_resolvers: list.into(),
            ..self.clone()
        }
    }

    /// Removes one resolver by identity.
    pub fn without_unknown_service_resolver(&self, resolver: &UnknownServiceResolver) -> Self {
        let list: Vec<_> = self
            .unknown_service_resolvers
            .iter()
            .filter(|r| *r != resolver)
            .cloned()
            .collect();
        Self {
            unknown_service_resolvers: list.into(),
            ..self.clone()
        }
    }

    pub fn without_unknown_service_resolvers(&self) -> Self {
        Self {
            unknown_service_resolvers: Arc::new([]),
            ..self.clone()
        }
    }

    pub fn with_factory_selector(&self, selector: FactorySelector) -> Self {
        Self {
            factory_selector: selector,
            ..self.clone()
        }
    }

    pub fn with_default_if_already_registered(&self, policy: IfAlreadyRegistered) -> Self {
        Self {
            default_if_already_registered: policy,
            ..self.clone()
        }
    }

    pub fn with_capabilities(&self, provider: impl CapabilityProvider + 'static) -> Self {
        Self {
            capabilities: Arc::new(provider),
            ..self.clone()
        }
    }

    /// Converter for constants that are not primitives.
    pub fn with_item_to_literal<F>(&self, convert: F) -> Self
    where
        F: Fn(&Item) -> Option<Literal> + Send + Sync + 'static,
    {
        Self {
            item_to_literal: Some(Arc::new(convert)),
            ..self.clone()
        }
    }

    pub fn without_item_to_literal(&self) -> Self {
        Self {
            item_to_literal: None,
            ..self.clone()
        }
    }

    pub fn without_throw_on_registering_disposable_transient(&self) -> Self {
        Self {
            throw_on_registering_disposable_transient: false,
            ..self.clone()
        }
    }

    pub fn with_throw_on_registering_disposable_transient(&self) -> Self {
        Self {
            throw_on_registering_disposable_transient: true,
            ..self.clone()
        }
    }

    /// Tracks disposable transients in the scope current at creation time.
    pub fn with_tracking_disposable_transients(&self) -> Self {
        Self {
            track_disposable_transients: true,
            ..self.clone()
        }
    }

    pub fn without_tracking_disposable_transients(&self) -> Self {
        Self {
            track_disposable_transients: false,
            ..self.clone()
        }
    }

    /// Stops plans from holding singleton instances inline.
    ///
    /// Singletons are then looked up in the singleton scope on every
    /// resolution.
    pub fn without_eager_caching_singletons(&self) -> Self {
        Self {
            eager_caching_singletons: false,
            ..self.clone()
        }
    }

    pub fn with_eager_caching_singletons(&self) -> Self {
        Self {
            eager_caching_singletons: true,
            ..self.clone()
        }
    }

    pub fn with_observer(&self, observer: Arc<dyn ResolutionObserver>) -> Self {
        let mut list = self.observers.to_vec();
        list.push(observer);
        Self {
            observers: list.into(),
            ..self.clone()
        }
    }

    pub fn unknown_service_resolvers(&self) -> &[UnknownServiceResolver] {
        &self.unknown_service_resolvers
    }

    pub fn factory_selector(&self) -> &FactorySelector {
        &self.factory_selector
    }

    pub fn default_if_already_registered(&self) -> IfAlreadyRegistered {
        self.default_if_already_registered
    }

    pub fn capabilities(&self) -> &dyn CapabilityProvider {
        &*self.capabilities
    }

    pub fn throw_on_registering_disposable_transient(&self) -> bool {
        self.throw_on_registering_disposable_transient
    }

    pub fn track_disposable_transients(&self) -> bool {
        self.track_disposable_transients
    }

    pub fn eager_caching_singletons(&self) -> bool {
        self.eager_caching_singletons
    }

    pub(crate) fn observers(&self) -> &[Arc<dyn ResolutionObserver>] {
        &self.observers
    }

    /// Converts a constant into an embeddable literal.
    pub(crate) fn literal_for(&self, item: &Item) -> DiResult<Literal> {
        primitive_literal(item)
            .or_else(|| self.item_to_literal.as_ref().and_then(|convert| convert(item)))
            .ok_or(DiError::StateIsRequiredToUseItem {
                item_type: item.type_info().name(),
            })
    }
}

impl fmt::Debug for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rules")
            .field("unknown_service_resolvers", &self.unknown_service_resolvers.len())
            .field("default_if_already_registered", &self.default_if_already_registered)
            .field("item_to_literal", &self.item_to_literal.is_some())
            .field(
                "throw_on_registering_disposable_transient",
                &self.throw_on_registering_disposable_transient,
            )
            .field("track_disposable_transients", &self.track_disposable_transients)
            .field("eager_caching_singletons", &self.eager_caching_singletons)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Opaque(u8);

    #[test]
    fn primitives_need_no_converter() {
        let rules = Rules::default();
        let literal = rules.literal_for(&Item::new(42u32)).unwrap();
        assert_eq!(literal.produce().downcast::<u32>().as_deref(), Some(&42));
        assert!(rules.literal_for(&Item::new(String::from("x"))).is_ok());
    }

    #[test]
    fn opaque_items_require_a_converter() {
        let item = Item::new(Opaque(3));
        assert!(matches!(
            Rules::default().literal_for(&item),
            Err(DiError::StateIsRequiredToUseItem { .. })
        ));

        let rules = Rules::default().with_item_to_literal(|item| {
            item.downcast_ref::<Opaque>().map(|o| {
                let n = o.0;
                Literal::of(move || Opaque(n))
            })
        });
        let produced = rules.literal_for(&item).unwrap().produce();
        assert_eq!(produced.downcast::<Opaque>().map(|o| o.0), Some(3));
    }

    #[test]
    fn copies_do_not_share_changes() {
        let base = Rules::default();
        let tracked = base.with_tracking_disposable_transients().without_eager_caching_singletons();
        assert!(!base.track_disposable_transients());
        assert!(base.eager_caching_singletons());
        assert!(tracked.track_disposable_transients());
        assert!(!tracked.eager_caching_singletons());
    }
}
