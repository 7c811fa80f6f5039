//! Error types for the resolution runtime.

use thiserror::Error;

use crate::key::ServiceKey;

/// Resolution and registration errors.
///
/// Every error is surfaced synchronously to the caller of `register` or
/// `resolve`. The only "recovered" failure is an unresolved service requested
/// with [`IfUnresolved::ReturnDefault`](crate::IfUnresolved::ReturnDefault),
/// which becomes `None` instead of an error.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Container, DiError, Resolver};
///
/// struct Unregistered;
///
/// let container = Container::new();
/// match container.resolve::<Unregistered>() {
///     Err(DiError::UnableToResolveUnknownService { service, .. }) => {
///         assert!(service.ends_with("Unregistered"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No registration and no unknown-service resolver produced a factory.
    #[error("Unable to resolve unknown service {service}{}", display_key(.key))]
    UnableToResolveUnknownService {
        service: &'static str,
        key: Option<ServiceKey>,
    },

    /// The factory selector could not pick one of several candidates.
    #[error("Ambiguous registrations for {service}: {count} candidates and no selector winner")]
    AmbiguousRegistrations { service: &'static str, count: usize },

    /// A dependency chain re-enters a service that is still being resolved.
    #[error("Recursive dependency detected: {}", .path.join(" -> "))]
    RecursiveDependencyDetected { path: Vec<&'static str> },

    /// A constant has no literal form that a plan can embed.
    #[error("State is required to use item of type {item_type}: register an item-to-literal converter")]
    StateIsRequiredToUseItem { item_type: &'static str },

    /// A transient disposable would never be disposed by the container.
    #[error(
        "Registered disposable transient {implementation} for {service} won't be disposed by container; \
         allow it explicitly or enable tracking"
    )]
    RegisteredDisposableTransientWontBeDisposedByContainer {
        service: &'static str,
        implementation: &'static str,
    },

    /// Scoped reuse requested without a matching open scope.
    #[error("No matching scope found for {service}{}", display_scope(.scope))]
    NoMatchingScopeFound {
        service: &'static str,
        scope: Option<String>,
    },

    /// Registration rejected by the `Throw` / `AppendNotKeyed` policy.
    #[error("Service {service}{} is already registered", display_key(.key))]
    ServiceIsAlreadyRegistered {
        service: &'static str,
        key: Option<ServiceKey>,
    },

    /// The scope was already disposed.
    #[error("Scope {id} is disposed")]
    ScopeIsDisposed { id: u64 },

    /// A deferred wrapper outlived its container.
    #[error("Container is disposed")]
    ContainerIsDisposed,

    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),

    /// A constructor asked for an argument its declared parameters don't provide.
    #[error("Argument {index} of {implementation} is missing or of a different kind")]
    ArgumentMismatch {
        implementation: &'static str,
        index: usize,
    },

    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),

    /// A user factory reported a failure.
    #[error("Factory for {service} failed: {message}")]
    FactoryFailed {
        service: &'static str,
        message: String,
    },

    /// A configuration value could not be parsed.
    #[error("Invalid configuration value for {name}: {message}")]
    InvalidConfiguration { name: String, message: String },
}

fn display_key(key: &Option<ServiceKey>) -> String {
    key.as_ref().map(|k| format!(" with key {k}")).unwrap_or_default()
}

fn display_scope(scope: &Option<String>) -> String {
    scope.as_ref().map(|s| format!(" in scope {s}")).unwrap_or_default()
}

/// Result type for resolution operations
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{DiResult, DiError};
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::TypeMismatch("some_service"))
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
