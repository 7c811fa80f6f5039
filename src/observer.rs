//! Resolution observers.
//!
//! Observers are registered on [`Rules`](crate::Rules) and called
//! synchronously on the resolving thread. Keep implementations cheap.

use std::time::Duration;

use crate::error::DiError;
use crate::plan::Fingerprint;
use crate::request::ServiceRequest;

/// Hooks into the resolution pipeline.
///
/// Every method has an empty default, so observers implement only what they
/// need.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{Container, Registration, ResolutionObserver, Resolver, ServiceRequest};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counting { resolved: AtomicUsize }
///
/// impl ResolutionObserver for Counting {
///     fn resolved(&self, _request: &ServiceRequest, _duration: Duration) {
///         self.resolved.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let counting = Arc::new(Counting::default());
/// let container = Container::new().with_rules(|r| r.with_observer(counting.clone()));
/// container.register(Registration::instance(Arc::new(7u32))).unwrap();
///
/// container.resolve::<u32>().unwrap();
/// assert_eq!(counting.resolved.load(Ordering::Relaxed), 1);
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// A resolution call is starting.
    fn resolving(&self, _request: &ServiceRequest) {}

    /// A resolution call finished, successfully or with an absent default.
    fn resolved(&self, _request: &ServiceRequest, _duration: Duration) {}

    /// A resolution call failed.
    fn failed(&self, _request: &ServiceRequest, _error: &DiError) {}

    /// A plan was compiled and cached.
    fn plan_compiled(&self, _fingerprint: &Fingerprint) {}
}

/// Emits `tracing` events for every resolution.
///
/// Successful resolutions are logged at `trace`, compiled plans at `debug`,
/// failures at `warn`.
#[derive(Debug, Default, Clone)]
pub struct TracingObserver {
    prefix: Option<String>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a prefix field to every event, to tell containers apart.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

impl ResolutionObserver for TracingObserver {
    fn resolving(&self, request: &ServiceRequest) {
        tracing::trace!(prefix = self.prefix(), service = %request, "resolving");
    }

    fn resolved(&self, request: &ServiceRequest, duration: Duration) {
        tracing::trace!(prefix = self.prefix(), service = %request, ?duration, "resolved");
    }

    fn failed(&self, request: &ServiceRequest, error: &DiError) {
        tracing::warn!(prefix = self.prefix(), service = %request, %error, "resolution failed");
    }

    fn plan_compiled(&self, fingerprint: &Fingerprint) {
        tracing::debug!(prefix = self.prefix(), %fingerprint, "plan compiled");
    }
}
