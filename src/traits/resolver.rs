//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::internal::{AsyncDisposer, SyncDisposer};
use crate::key::{ServiceKey, TypeInfo};
use crate::registration::Instance;
use crate::request::{IfUnresolved, ServiceRequest};
use crate::traits::{AsyncDispose, Dispose};
use crate::wrappers::{DeferredKind, DeferredRequest, FactoryOf, Lazy};

/// Object-safe resolution entry points.
///
/// Implemented by the container, by scopes, and by the context handed to
/// delegate factories. Each implementation supplies its own ambient scope and
/// disposal owner; the resolution pipeline is shared.
///
/// Most users should use the [`Resolver`] trait instead, which layers typed
/// generic methods on top of this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves a request to a type-erased instance.
    ///
    /// Returns `Ok(None)` only for requests with
    /// [`IfUnresolved::ReturnDefault`] that could not be satisfied.
    fn resolve_any(&self, request: &ServiceRequest) -> DiResult<Option<Instance>>;

    /// Captures a request for later resolution, bound to this resolver's scopes.
    fn defer(&self, request: ServiceRequest, kind: DeferredKind) -> DiResult<DeferredRequest>;

    /// Registers a synchronous disposal hook with this resolver's owner scope.
    fn push_sync_disposer(&self, f: SyncDisposer);

    /// Registers an asynchronous disposal hook with this resolver's owner scope.
    fn push_async_disposer(&self, f: AsyncDisposer);
}

/// Typed resolution API.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{Arguments, Container, DiResult, Injectable, Registration, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str);
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) {
///         println!("LOG: {}", msg);
///     }
/// }
/// impl Injectable for ConsoleLogger {
///     fn construct(_: &mut Arguments) -> DiResult<Self> { Ok(ConsoleLogger) }
/// }
///
/// let container = Container::new();
/// container.register(
///     Registration::<dyn Logger>::implemented_by::<ConsoleLogger>(|l| l as Arc<dyn Logger>),
/// ).unwrap();
///
/// let logger = container.resolve::<dyn Logger>().unwrap();
/// logger.log("Service resolved successfully");
///
/// assert!(container.try_resolve::<String>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves the default (unkeyed) registration of `T`.
    fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        required(self.resolve_with::<T>(None, IfUnresolved::Throw)?)
    }

    /// Resolves the registration of `T` under `key`.
    fn resolve_keyed<T: ?Sized + Send + Sync + 'static>(&self, key: impl Into<ServiceKey>) -> DiResult<Arc<T>> {
        required(self.resolve_with::<T>(Some(key.into()), IfUnresolved::Throw)?)
    }

    /// Resolves `T`, returning `None` when nothing can produce it.
    ///
    /// Other failures (ambiguity, cycles, missing scopes) still surface as errors.
    fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.resolve_with::<T>(None, IfUnresolved::ReturnDefault)
    }

    /// Resolves `T` with an explicit key and unresolved policy.
    fn resolve_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: Option<ServiceKey>,
        if_unresolved: IfUnresolved,
    ) -> DiResult<Option<Arc<T>>> {
        let mut request = ServiceRequest::of::<T>().if_unresolved(if_unresolved);
        if let Some(key) = key {
            request = request.keyed(key);
        }
        self.resolve_request::<T>(&request)
    }

    /// Resolves a fully described request and downcasts the result.
    fn resolve_request<T: ?Sized + Send + Sync + 'static>(&self, request: &ServiceRequest) -> DiResult<Option<Arc<T>>> {
        match self.resolve_any(request)? {
            Some(instance) => instance
                .downcast::<T>()
                .map(Some)
                .ok_or(DiError::TypeMismatch(std::any::type_name::<T>())),
            None => Ok(None),
        }
    }

    /// Resolves `T`, panicking on failure.
    ///
    /// Use when a missing registration is a configuration bug that should
    /// fail fast.
    fn resolve_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.resolve::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    /// Returns a wrapper that resolves `T` on first access and caches it.
    fn resolve_lazy<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Lazy<T>> {
        Ok(Lazy::new(self.defer(ServiceRequest::of::<T>(), DeferredKind::Lazy)?))
    }

    /// Returns a wrapper that resolves `T` on every invocation.
    fn resolve_factory<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<FactoryOf<T>> {
        Ok(FactoryOf::new(self.defer(ServiceRequest::of::<T>(), DeferredKind::Factory)?))
    }

    /// Registers a service for synchronous disposal with the owner scope.
    ///
    /// Disposal hooks execute in LIFO order (last registered, first disposed).
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.push_sync_disposer(Box::new(move || service.dispose()));
    }

    /// Registers a service for asynchronous disposal with the owner scope.
    fn register_async_disposer<T: AsyncDispose>(&self, service: Arc<T>) {
        self.push_async_disposer(Box::new(move || {
            Box::pin(async move {
                service.dispose().await;
            })
        }));
    }
}

fn required<T: ?Sized + 'static>(value: Option<Arc<T>>) -> DiResult<Arc<T>> {
    value.ok_or(DiError::UnableToResolveUnknownService {
        service: TypeInfo::of::<T>().name(),
        key: None,
    })
}
