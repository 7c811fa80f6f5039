use ferrous_resolver::{
    Arguments, AutoFallback, Container, Dependency, DiError, DiResult, FactorySelector, IfUnresolved, Injectable, Lazy, Literal,
    Metadata, Parameter, ParameterRule, Registration, Resolver, Reuse, Rules, ServiceRequest,
    UnknownServiceResolver,
};
use std::sync::Arc;

// ===== Unknown Service Resolvers =====

struct Unregistered(&'static str);

fn fallback() -> UnknownServiceResolver {
    UnknownServiceResolver::new(|request| {
        request
            .lookup_type()
            .is::<Unregistered>()
            .then(|| Registration::instance(Arc::new(Unregistered("fallback"))).into_factory())
    })
}

#[test]
fn unknown_service_resolver_supplies_missing_service() {
    let container = Container::with(Rules::default().with_unknown_service_resolvers([fallback()]));
    assert_eq!(container.resolve::<Unregistered>().unwrap().0, "fallback");
    assert!(!container.is_registered::<Unregistered>());
}

#[test]
fn removing_resolver_and_cache_makes_service_absent() {
    let resolver = fallback();
    let container = Container::new().with_rules(|r| r.with_unknown_service_resolvers([resolver.clone()]));
    assert!(container.try_resolve::<Unregistered>().unwrap().is_some());

    let without = container
        .with_rules(|r| r.without_unknown_service_resolver(&resolver))
        .without_cache();

    assert!(without.try_resolve::<Unregistered>().unwrap().is_none());
    assert!(matches!(
        without.resolve::<Unregistered>(),
        Err(DiError::UnableToResolveUnknownService { .. })
    ));

    // The original container keeps its resolver
    assert!(container.try_resolve::<Unregistered>().unwrap().is_some());
}

#[test]
fn registrations_take_precedence_over_resolvers() {
    let container = Container::with(Rules::default().with_unknown_service_resolvers([fallback()]));
    container.register_instance(Arc::new(Unregistered("registered"))).unwrap();
    assert_eq!(container.resolve::<Unregistered>().unwrap().0, "registered");
}

// ===== Factory Selector =====

#[derive(Debug)]
struct Version(u32);

#[test]
fn last_registered_selector_breaks_ties() {
    let container = Container::with(Rules::default().with_factory_selector(FactorySelector::last_registered()));
    container.register_instance(Arc::new(Version(1))).unwrap();
    container.register_instance(Arc::new(Version(2))).unwrap();

    assert_eq!(container.resolve::<Version>().unwrap().0, 2);
}

#[test]
fn first_registered_selector_breaks_ties() {
    let container = Container::with(Rules::default().with_factory_selector(FactorySelector::first_registered()));
    container.register_instance(Arc::new(Version(1))).unwrap();
    container.register_instance(Arc::new(Version(2))).unwrap();

    assert_eq!(container.resolve::<Version>().unwrap().0, 1);
}

#[test]
fn selector_without_winner_falls_back_to_unresolved_policy() {
    let no_singletons = FactorySelector::new(|_request, candidates| {
        candidates
            .iter()
            .find(|f| !matches!(f.reuse(), Reuse::Singleton))
            .cloned()
    });
    let container = Container::with(Rules::default().with_factory_selector(no_singletons));
    container.register_instance(Arc::new(Version(1))).unwrap();

    assert!(container.try_resolve::<Version>().unwrap().is_none());
    assert!(matches!(
        container.resolve::<Version>(),
        Err(DiError::UnableToResolveUnknownService { .. })
    ));
}

#[test]
fn selector_sees_the_request_chain() {
    struct Owner {
        version: Arc<Version>,
    }
    impl Injectable for Owner {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::of::<Version>("version")]
        }
        fn construct(args: &mut Arguments) -> DiResult<Self> {
            Ok(Owner { version: args.get()? })
        }
    }

    // Dependencies of Owner get the newest version, direct requests the oldest
    let by_parent = FactorySelector::new(|request, candidates| match request.parent() {
        Some(parent) if parent.service_type().is::<Owner>() => candidates.last().cloned(),
        _ => candidates.first().cloned(),
    });
    let container = Container::with(Rules::default().with_factory_selector(by_parent));
    container.register_instance(Arc::new(Version(1))).unwrap();
    container.register_instance(Arc::new(Version(2))).unwrap();
    container.register_transient::<Owner>().unwrap();

    assert_eq!(container.resolve::<Version>().unwrap().0, 1);
    assert_eq!(container.resolve::<Owner>().unwrap().version.0, 2);
}

// ===== Capabilities =====

struct Import(&'static str);

struct Greeting {
    text: Arc<String>,
}

impl Injectable for Greeting {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::of::<String>("text").annotated(Import("hello"))]
    }

    fn construct(args: &mut Arguments) -> DiResult<Self> {
        Ok(Greeting { text: args.get()? })
    }
}

fn import_rule() -> ParameterRule {
    ParameterRule::new(|parameter, _request| {
        parameter
            .annotation::<Import>()
            .map(|import| Dependency::from(parameter).with_key(import.0))
    })
}

#[test]
fn parameter_rule_maps_annotation_to_service_key() {
    let container = Container::with(Rules::default().with_capabilities(import_rule()));
    container
        .register(Registration::instance(Arc::new("hello, world".to_string())).key("hello"))
        .unwrap();
    container
        .register(Registration::instance(Arc::new("goodbye".to_string())).key("bye"))
        .unwrap();
    container.register_transient::<Greeting>().unwrap();

    assert_eq!(container.resolve::<Greeting>().unwrap().text.as_str(), "hello, world");
}

#[test]
fn declared_parameters_ignore_annotations() {
    let container = Container::new();
    container
        .register(Registration::instance(Arc::new("hello, world".to_string())).key("hello"))
        .unwrap();
    container.register_transient::<Greeting>().unwrap();

    assert!(matches!(
        container.resolve::<Greeting>(),
        Err(DiError::UnableToResolveUnknownService { .. })
    ));
}

// ===== Metadata =====

#[derive(Debug, PartialEq)]
enum Flavor {
    Hey,
    Blah,
}

trait FooService: Send + Sync {
    fn flavor(&self) -> Flavor;
}

struct FooHey;
impl FooService for FooHey {
    fn flavor(&self) -> Flavor {
        Flavor::Hey
    }
}
impl Injectable for FooHey {
    fn construct(_: &mut Arguments) -> DiResult<Self> {
        Ok(FooHey)
    }
}

struct FooBlah;
impl FooService for FooBlah {
    fn flavor(&self) -> Flavor {
        Flavor::Blah
    }
}
impl Injectable for FooBlah {
    fn construct(_: &mut Arguments) -> DiResult<Self> {
        Ok(FooBlah)
    }
}

struct FooConsumer {
    foo: Lazy<dyn FooService>,
}

impl Injectable for FooConsumer {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::lazy::<dyn FooService>("foo").with_metadata(Metadata::new(Flavor::Blah))]
    }

    fn construct(args: &mut Arguments) -> DiResult<Self> {
        Ok(FooConsumer { foo: args.lazy()? })
    }
}

fn foo_container() -> Container {
    let container = Container::new();
    container
        .register(
            Registration::<dyn FooService>::implemented_by::<FooHey>(|f| f as Arc<dyn FooService>)
                .metadata(Metadata::new(Flavor::Hey)),
        )
        .unwrap();
    container
        .register(
            Registration::<dyn FooService>::implemented_by::<FooBlah>(|f| f as Arc<dyn FooService>)
                .metadata(Metadata::new(Flavor::Blah)),
        )
        .unwrap();
    container
}

#[test]
fn metadata_selects_among_same_service_registrations() {
    let container = foo_container();
    container.register_transient::<FooConsumer>().unwrap();

    let consumer = container.resolve::<FooConsumer>().unwrap();
    assert!(!consumer.foo.is_value_created());
    assert_eq!(consumer.foo.value().unwrap().flavor(), Flavor::Blah);
    assert!(consumer.foo.is_value_created());
}

#[test]
fn metadata_request_without_match_is_unresolved() {
    let container = foo_container();
    let request = ServiceRequest::of::<dyn FooService>()
        .with_metadata(Metadata::new("other"))
        .if_unresolved(IfUnresolved::ReturnDefault);

    assert!(container.resolve_request::<dyn FooService>(&request).unwrap().is_none());
}

// ===== Constants =====

#[derive(Debug, Clone, PartialEq)]
struct Endpoint {
    host: String,
    port: u16,
}

struct Client {
    endpoint: Endpoint,
}

impl Injectable for Client {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::of::<Endpoint>("endpoint")]
    }

    fn construct(args: &mut Arguments) -> DiResult<Self> {
        Ok(Client { endpoint: args.value()? })
    }
}

fn endpoint() -> Endpoint {
    Endpoint {
        host: "localhost".to_string(),
        port: 8080,
    }
}

#[test]
fn non_primitive_constant_requires_converter() {
    let container = Container::new();
    container
        .register(Registration::<Client>::new().with_argument(0, endpoint()))
        .unwrap();

    match container.resolve::<Client>() {
        Err(DiError::StateIsRequiredToUseItem { item_type }) => assert!(item_type.ends_with("Endpoint")),
        other => panic!("expected missing literal error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn converter_embeds_non_primitive_constant() {
    let rules = Rules::default().with_item_to_literal(|item| {
        item.downcast_ref::<Endpoint>().map(|endpoint| {
            let endpoint = endpoint.clone();
            Literal::of(move || endpoint.clone())
        })
    });
    let container = Container::with(rules);
    container
        .register(Registration::<Client>::new().with_argument(0, endpoint()))
        .unwrap();

    let client = container.resolve::<Client>().unwrap();
    assert_eq!(client.endpoint, endpoint());
    assert_eq!(client.endpoint.port, 8080);
    assert_eq!(client.endpoint.host, "localhost");
}

// ===== Copy on Write =====

#[test]
fn with_rules_leaves_original_untouched() {
    let container = Container::new();
    let tracking = container.with_rules(|r| r.with_tracking_disposable_transients().without_eager_caching_singletons());

    assert!(!container.rules().track_disposable_transients());
    assert!(container.rules().eager_caching_singletons());
    assert!(tracking.rules().track_disposable_transients());
    assert!(!tracking.rules().eager_caching_singletons());
}

#[test]
fn derived_container_shares_singletons() {
    struct Counter;
    impl Injectable for Counter {
        fn construct(_: &mut Arguments) -> DiResult<Self> {
            Ok(Counter)
        }
    }

    let container = Container::new();
    container.register_singleton::<Counter>().unwrap();
    let a = container.resolve::<Counter>().unwrap();

    let derived = container.with_rules(|r| r.without_eager_caching_singletons()).without_cache();
    let b = derived.resolve::<Counter>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn derived_container_resolutions_stay_out_of_origin() {
    let origin = Container::new();
    let derived = origin.with_rules(|r| r.with_unknown_service_resolvers([fallback()]));

    assert!(derived.try_resolve::<Unregistered>().unwrap().is_some());
    assert!(origin.try_resolve::<Unregistered>().unwrap().is_none());
    assert_eq!(origin.cached_plans(), 0);
    assert_eq!(derived.cached_plans(), 1);
}

#[test]
fn derived_container_registrations_stay_out_of_origin() {
    struct Greeter;
    impl Injectable for Greeter {
        fn construct(_: &mut Arguments) -> DiResult<Self> {
            Ok(Greeter)
        }
    }

    let origin = Container::new();
    let derived = origin.with_rules(|r| r.clone());
    derived.register_transient::<Greeter>().unwrap();

    assert!(derived.resolve::<Greeter>().is_ok());
    assert!(origin.try_resolve::<Greeter>().unwrap().is_none());
}

#[test]
fn derived_container_starts_from_a_copy_of_origin_plans() {
    let origin = Container::new();
    origin.register_instance(Arc::new(Version(1))).unwrap();
    assert_eq!(origin.resolve::<Version>().unwrap().0, 1);

    let derived = origin.with_rules(|r| r.clone());
    assert_eq!(derived.cached_plans(), 1);

    derived.clear_cache();
    assert_eq!(derived.cached_plans(), 0);
    assert_eq!(origin.cached_plans(), 1);

    origin.clear_cache();
    assert_eq!(origin.resolve::<Version>().unwrap().0, 1);
    assert_eq!(derived.cached_plans(), 0);
}

// ===== Auto Fallback =====

trait Me: Send + Sync {
    fn name(&self) -> &'static str;
}

struct PlainMe;

impl Me for PlainMe {
    fn name(&self) -> &'static str {
        "plain"
    }
}

impl Injectable for PlainMe {
    fn construct(_: &mut Arguments) -> DiResult<Self> {
        Ok(PlainMe)
    }
}

struct MiniMe;

impl Me for MiniMe {
    fn name(&self) -> &'static str {
        "mini"
    }
}

impl Injectable for MiniMe {
    fn construct(_: &mut Arguments) -> DiResult<Self> {
        Ok(MiniMe)
    }
}

macro_rules! me_consumer {
    ($name:ident) => {
        struct $name {
            me: Arc<dyn Me>,
        }

        impl Injectable for $name {
            fn parameters() -> Vec<Parameter> {
                vec![Parameter::of::<dyn Me>("me")]
            }

            fn construct(args: &mut Arguments) -> DiResult<Self> {
                Ok($name { me: args.get()? })
            }
        }
    };
}

me_consumer!(GreenMe);
me_consumer!(RedMe);

fn plain_me() -> Registration<dyn Me> {
    Registration::<dyn Me>::implemented_by::<PlainMe>(|m| m as Arc<dyn Me>)
}

fn mini_me() -> Registration<dyn Me> {
    Registration::<dyn Me>::implemented_by::<MiniMe>(|m| m as Arc<dyn Me>)
}

fn reject_singletons(reuse: &Reuse, _: &ferrous_resolver::Request<'_>) -> Option<Reuse> {
    (*reuse != Reuse::Singleton).then(|| reuse.clone())
}

#[test]
fn auto_fallback_with_several_candidates_respects_unresolved_policy() {
    let fallback = AutoFallback::new()
        .implementation(plain_me())
        .implementation(mini_me())
        .with_reuse(reject_singletons);
    let container = Container::with(Rules::default().with_auto_fallback_resolution(fallback));

    assert!(container.try_resolve::<dyn Me>().unwrap().is_none());
    assert!(matches!(
        container.resolve::<dyn Me>(),
        Err(DiError::UnableToResolveUnknownService { .. })
    ));
}

#[test]
fn auto_fallback_reuse_mapper_rejects_candidates() {
    let fallback = AutoFallback::new()
        .implementation(plain_me())
        .implementation(mini_me().reuse(Reuse::Singleton))
        .with_reuse(reject_singletons);
    let container = Container::with(Rules::default().with_auto_fallback_resolution(fallback));

    assert_eq!(container.resolve::<dyn Me>().unwrap().name(), "plain");
    assert!(!container.is_registered::<dyn Me>());
}

#[test]
fn auto_fallback_reuse_mapper_changes_reuse() {
    let fallback = AutoFallback::new()
        .implementation(plain_me())
        .with_reuse(|_, _| Some(Reuse::Singleton));
    let container = Container::with(Rules::default().with_auto_fallback_resolution(fallback));
    container.register_transient::<GreenMe>().unwrap();

    let a = container.resolve::<GreenMe>().unwrap();
    let b = container.resolve::<dyn Me>().unwrap();
    assert!(Arc::ptr_eq(&a.me, &b));
}

#[test]
fn auto_fallback_condition_excludes_unwanted_consumers() {
    let fallback = AutoFallback::new().implementation(plain_me()).with_condition(|request| {
        request
            .parent()
            .and_then(|parent| parent.implementation_type())
            .is_some_and(|implementation| implementation.name().contains("Green"))
    });
    let container = Container::with(Rules::default().with_auto_fallback_resolution(fallback));
    container.register_transient::<GreenMe>().unwrap();
    container.register_transient::<RedMe>().unwrap();

    assert_eq!(container.resolve::<GreenMe>().unwrap().me.name(), "plain");
    assert!(matches!(
        container.resolve::<RedMe>(),
        Err(DiError::UnableToResolveUnknownService { .. })
    ));
}
