//! Disposal traits for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Services implementing this trait return it from
/// [`Injectable::disposer`](crate::Injectable::disposer) so the owning scope
/// can release them. Hooks run in reverse order of creation when the scope is
/// disposed.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{Arguments, Container, DiResult, Dispose, Injectable, Registration, Resolver, Reuse};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// #[derive(Default)]
/// struct Cache { flushed: AtomicBool }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// impl Injectable for Cache {
///     fn construct(_: &mut Arguments) -> DiResult<Self> { Ok(Cache::default()) }
///     fn disposer() -> Option<fn(&Self)> { Some(<Self as Dispose>::dispose) }
/// }
///
/// let container = Container::new();
/// container.register(Registration::<Cache>::new().reuse(Reuse::scoped())).unwrap();
///
/// let scope = container.open_scope(None);
/// let cache = scope.resolve::<Cache>().unwrap();
/// scope.dispose();
/// assert!(cache.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}

/// Trait for asynchronous resource disposal.
///
/// Async hooks are registered from delegate factories through
/// [`Resolver::register_async_disposer`](crate::Resolver::register_async_disposer)
/// and only run when the owning scope is disposed with `dispose_async`.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{AsyncDispose, Container, Registration, Resolver, Reuse};
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) {
///         println!("Closing database connection: {}", self.connection_id);
///     }
/// }
///
/// let container = Container::new();
/// container.register(
///     Registration::<DatabaseClient>::delegate(|ctx| {
///         let client = Arc::new(DatabaseClient { connection_id: "conn_123".to_string() });
///         ctx.register_async_disposer(client.clone());
///         Ok(client)
///     })
///     .reuse(Reuse::Singleton),
/// ).unwrap();
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self);
}
