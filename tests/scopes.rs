use ferrous_resolver::{
    Arguments, Container, DiError, DiResult, FactoryOf, Injectable, Lazy, Parameter, Registration, Resolver, Reuse,
    ScopeName, Setup,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

struct RequestContext {
    id: usize,
}

impl Injectable for RequestContext {
    fn construct(_: &mut Arguments) -> DiResult<Self> {
        Ok(RequestContext {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
        })
    }
}

struct Handler {
    context: Arc<RequestContext>,
}

impl Injectable for Handler {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::of::<RequestContext>("context")]
    }

    fn construct(args: &mut Arguments) -> DiResult<Self> {
        Ok(Handler { context: args.get()? })
    }
}

#[test]
fn scoped_instance_is_shared_within_scope_only() {
    let container = Container::new();
    container.register_scoped::<RequestContext>().unwrap();
    container.register_transient::<Handler>().unwrap();

    let first = container.open_scope(None);
    let a = first.resolve::<Handler>().unwrap();
    let b = first.resolve::<Handler>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a.context, &b.context));

    let second = container.open_scope(None);
    let c = second.resolve::<Handler>().unwrap();
    assert_ne!(a.context.id, c.context.id);
}

#[test]
fn unnamed_scoped_reuse_binds_to_innermost_scope() {
    let container = Container::new();
    container.register_scoped::<RequestContext>().unwrap();

    let outer = container.open_scope(None);
    let inner = outer.open_scope(None);

    let a = outer.resolve::<RequestContext>().unwrap();
    let b = inner.resolve::<RequestContext>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn named_scoped_reuse_walks_out_to_matching_scope() {
    let container = Container::new();
    container
        .register(Registration::<RequestContext>::new().reuse(Reuse::scoped_to("request")))
        .unwrap();

    let request = container.open_scope(Some("request".into()));
    let unit_of_work = request.open_scope(Some("unit-of-work".into()));
    let nested = unit_of_work.open_scope(None);

    let a = request.resolve::<RequestContext>().unwrap();
    let b = nested.resolve::<RequestContext>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(unit_of_work.name(), Some(&ScopeName::from("unit-of-work")));
}

#[test]
fn scoped_service_without_scope_fails() {
    let container = Container::new();
    container.register_scoped::<RequestContext>().unwrap();

    match container.resolve::<RequestContext>() {
        Err(DiError::NoMatchingScopeFound { service, scope: None }) => {
            assert!(service.ends_with("RequestContext"));
        }
        other => panic!("expected missing scope, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn named_scope_must_exist_in_ancestry() {
    let container = Container::new();
    container
        .register(Registration::<RequestContext>::new().reuse(Reuse::scoped_to("request")))
        .unwrap();

    let other = container.open_scope(Some("job".into()));
    match other.resolve::<RequestContext>() {
        Err(DiError::NoMatchingScopeFound { scope: Some(name), .. }) => assert_eq!(name, "request"),
        other => panic!("expected missing scope, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn singleton_cannot_capture_scoped_dependency() {
    let container = Container::new();
    container.register_scoped::<RequestContext>().unwrap();
    container
        .register(Registration::<Handler>::new().reuse(Reuse::Singleton))
        .unwrap();

    let scope = container.open_scope(None);
    assert!(matches!(
        scope.resolve::<Handler>(),
        Err(DiError::NoMatchingScopeFound { .. })
    ));
}

#[test]
fn disposed_scope_rejects_resolution() {
    let container = Container::new();
    container.register_scoped::<RequestContext>().unwrap();

    let scope = container.open_scope(None);
    let id = scope.id();
    scope.dispose();

    match scope.resolve::<RequestContext>() {
        Err(DiError::ScopeIsDisposed { id: disposed }) => assert_eq!(disposed, id),
        other => panic!("expected disposed scope, got {:?}", other.map(|_| ())),
    }
}

struct Spawner {
    contexts: FactoryOf<RequestContext>,
}

impl Injectable for Spawner {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::factory::<RequestContext>("contexts")]
    }

    fn construct(args: &mut Arguments) -> DiResult<Self> {
        Ok(Spawner { contexts: args.factory()? })
    }
}

#[test]
fn factory_outliving_its_scope_reports_disposal() {
    let container = Container::new();
    container.register_scoped::<RequestContext>().unwrap();
    container.register_transient::<Spawner>().unwrap();

    let scope = container.open_scope(None);
    let spawner = scope.resolve::<Spawner>().unwrap();
    let a = spawner.contexts.create().unwrap();
    let b = spawner.contexts.create().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    drop(scope);
    assert!(matches!(spawner.contexts.create(), Err(DiError::ScopeIsDisposed { .. })));
}

struct Ticket {
    disposed: Arc<AtomicUsize>,
}

impl Injectable for Ticket {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::of::<AtomicUsize>("disposed")]
    }

    fn construct(args: &mut Arguments) -> DiResult<Self> {
        Ok(Ticket { disposed: args.get()? })
    }

    fn disposer() -> Option<fn(&Self)> {
        Some(Ticket::release)
    }
}

impl Ticket {
    fn release(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

struct Booth {
    tickets: FactoryOf<Ticket>,
    first: Lazy<Ticket>,
}

impl Injectable for Booth {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::factory::<Ticket>("tickets"), Parameter::lazy::<Ticket>("first")]
    }

    fn construct(args: &mut Arguments) -> DiResult<Self> {
        Ok(Booth {
            tickets: args.factory()?,
            first: args.lazy()?,
        })
    }
}

#[test]
fn deferred_wrappers_fail_once_their_scope_is_disposed() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container.register_instance(disposed.clone()).unwrap();
    container
        .register(Registration::<Ticket>::new().setup(Setup::new().track_disposable_transient()))
        .unwrap();
    container.register_transient::<Booth>().unwrap();

    let scope = container.open_scope(None);
    let booth = scope.resolve::<Booth>().unwrap();
    let _ticket = booth.tickets.create().unwrap();

    scope.dispose();
    assert_eq!(disposed.load(Ordering::SeqCst), 1);

    match booth.tickets.create() {
        Err(DiError::ScopeIsDisposed { id }) => assert_eq!(id, scope.id()),
        other => panic!("expected disposed scope, got {:?}", other.map(|_| ())),
    }
    assert!(matches!(booth.first.value(), Err(DiError::ScopeIsDisposed { .. })));
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn factory_outliving_its_container_reports_disposal() {
    let container = Container::new();
    container.register_transient::<RequestContext>().unwrap();
    container.register_transient::<Spawner>().unwrap();

    let spawner = container.resolve::<Spawner>().unwrap();
    assert!(spawner.contexts.create().is_ok());

    drop(container);
    assert!(matches!(spawner.contexts.create(), Err(DiError::ContainerIsDisposed)));
}
