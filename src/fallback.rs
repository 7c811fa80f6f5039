//! Automatic fallback registrations for unknown services.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::registration::{Factory, Registration};
use crate::request::Request;
use crate::reuse::Reuse;
use crate::rules::{Rules, UnknownServiceResolver};

type ReuseMapFn = dyn Fn(&Reuse, &Request<'_>) -> Option<Reuse> + Send + Sync;
type ConditionFn = dyn Fn(&Request<'_>) -> bool + Send + Sync;

/// Implementations offered for services nobody registered.
///
/// When a request finds no registration, the candidates registered for the
/// requested type and key are considered. The reuse mapper may change the
/// reuse of a candidate or reject it by returning `None`. If exactly one
/// candidate remains it is used; none or several leave the request
/// unresolved, so `IfUnresolved` decides the outcome.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Arguments, AutoFallback, Container, DiResult, Injectable, Registration, Resolver, Rules};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {}
/// struct SystemClock;
/// impl Clock for SystemClock {}
/// impl Injectable for SystemClock {
///     fn construct(_: &mut Arguments) -> DiResult<Self> { Ok(SystemClock) }
/// }
///
/// let fallback = AutoFallback::new()
///     .implementation(Registration::<dyn Clock>::implemented_by::<SystemClock>(|c| c as Arc<dyn Clock>));
/// let container = Container::with(Rules::default().with_auto_fallback_resolution(fallback));
///
/// assert!(container.resolve::<dyn Clock>().is_ok());
/// assert!(!container.is_registered::<dyn Clock>());
/// ```
#[derive(Clone, Default)]
pub struct AutoFallback {
    candidates: Vec<Arc<Factory>>,
    reuse: Option<Arc<ReuseMapFn>>,
    condition: Option<Arc<ConditionFn>>,
}

impl AutoFallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn implementation<S: ?Sized + Send + Sync + 'static>(mut self, registration: Registration<S>) -> Self {
        self.candidates.push(registration.into_factory());
        self
    }

    /// Maps the reuse of each candidate; `None` rejects the candidate.
    pub fn with_reuse<F>(mut self, map: F) -> Self
    where
        F: Fn(&Reuse, &Request<'_>) -> Option<Reuse> + Send + Sync + 'static,
    {
        self.reuse = Some(Arc::new(map));
        self
    }

    /// Only requests passing `condition` are served.
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Request<'_>) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn into_resolver(self) -> UnknownServiceResolver {
        // Remapped factories keep one identity per (candidate, reuse)
        let remapped: DashMap<(usize, Reuse), Arc<Factory>> = DashMap::new();

        UnknownServiceResolver::new(move |request| {
            if let Some(condition) = &self.condition {
                if !condition(request) {
                    return None;
                }
            }

            let service = request.lookup_type();
            let mut matching = self
                .candidates
                .iter()
                .enumerate()
                .filter(|(_, f)| f.service_type() == service && f.service_key() == request.service_key())
                .filter_map(|(index, factory)| {
                    let reuse = match &self.reuse {
                        Some(map) => map(factory.reuse(), request)?,
                        None => factory.reuse().clone(),
                    };
                    if &reuse == factory.reuse() {
                        return Some(factory.clone());
                    }
                    let mapped = remapped
                        .entry((index, reuse.clone()))
                        .or_insert_with(|| Arc::new(factory.with_reuse(reuse)));
                    Some(mapped.value().clone())
                });

            let first = matching.next()?;
            if matching.next().is_some() {
                tracing::debug!(service = service.name(), "several fallback implementations; leaving unresolved");
                return None;
            }
            tracing::trace!(service = service.name(), "fallback implementation used");
            Some(first)
        })
    }
}

impl fmt::Debug for AutoFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoFallback")
            .field("candidates", &self.candidates.len())
            .field("reuse", &self.reuse.is_some())
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

impl Rules {
    /// Appends the resolver built from `fallback`.
    pub fn with_auto_fallback_resolution(&self, fallback: AutoFallback) -> Self {
        self.with_unknown_service_resolvers([fallback.into_resolver()])
    }
}
