/// Concurrent access tests
///
/// Verify that singleton construction collapses to one instance under racing
/// first resolutions, and that scopes and registration stay consistent when
/// shared across threads.

use crossbeam_utils::thread;
use ferrous_resolver::{Arguments, Container, DiResult, Injectable, Registration, Resolver, Reuse};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const THREADS: usize = 8;

static EXPENSIVE_CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

struct Expensive;

impl Injectable for Expensive {
    fn construct(_: &mut Arguments) -> DiResult<Self> {
        EXPENSIVE_CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        Ok(Expensive)
    }
}

#[test]
fn concurrent_first_resolution_constructs_singleton_once() {
    let container = Container::new();
    container
        .register(Registration::<Expensive>::new().reuse(Reuse::Singleton))
        .unwrap();
    let barrier = Barrier::new(THREADS);

    let instances = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    container.resolve::<Expensive>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    })
    .unwrap();

    assert_eq!(EXPENSIVE_CONSTRUCTED.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

static SCOPED_CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

struct PerScope;

impl Injectable for PerScope {
    fn construct(_: &mut Arguments) -> DiResult<Self> {
        SCOPED_CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        Ok(PerScope)
    }
}

#[test]
fn shared_scope_constructs_scoped_service_once() {
    let container = Container::new();
    container.register_scoped::<PerScope>().unwrap();
    let scope = container.open_scope(None);
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                scope.resolve::<PerScope>().unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(SCOPED_CONSTRUCTED.load(Ordering::SeqCst), 1);
}

struct Isolated;

impl Injectable for Isolated {
    fn construct(_: &mut Arguments) -> DiResult<Self> {
        Ok(Isolated)
    }
}

#[test]
fn scopes_opened_per_thread_are_isolated() {
    let container = Container::new();
    container.register_scoped::<Isolated>().unwrap();

    let pointers = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    let scope = container.open_scope(None);
                    let a = scope.resolve::<Isolated>().unwrap();
                    let b = scope.resolve::<Isolated>().unwrap();
                    assert!(Arc::ptr_eq(&a, &b));
                    Arc::as_ptr(&a) as usize
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    })
    .unwrap();

    // Instances live until each thread's scope drops, so addresses may be reused;
    // every thread still got a usable instance
    assert_eq!(pointers.len(), THREADS);
}

#[derive(Debug)]
struct Slot(usize);

#[test]
fn registration_while_resolving_is_consistent() {
    let container = Container::new();
    container.register_instance(Arc::new(Slot(0))).unwrap();

    thread::scope(|s| {
        s.spawn(|_| {
            for i in 1..50 {
                container.register(Registration::instance(Arc::new(Slot(i))).key(i)).unwrap();
            }
        });
        for _ in 0..4 {
            s.spawn(|_| {
                for _ in 0..200 {
                    assert_eq!(container.resolve::<Slot>().unwrap().0, 0);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(container.registrations().len(), 50);
    assert_eq!(container.resolve_keyed::<Slot>(49usize).unwrap().0, 49);
}
