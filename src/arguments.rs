//! Positional constructor arguments.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::registration::Instance;
use crate::wrappers::{DeferredKind, DeferredRequest, FactoryOf, Lazy, ResolutionScope};

/// One evaluated dependency.
pub(crate) enum Argument {
    /// Resolved (or absent) service, or a constant.
    Value(Option<Instance>),
    Deferred(DeferredRequest),
    Scope(ResolutionScope),
}

/// Arguments for [`Injectable::construct`](crate::Injectable::construct),
/// in the order of the declared parameters.
///
/// Each accessor consumes the next argument; asking for a kind that does not
/// match the declared parameter fails with `ArgumentMismatch`.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Arguments, DiResult, Injectable, Lazy, Parameter};
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Audit;
///
/// struct Service {
///     clock: Arc<Clock>,
///     audit: Option<Arc<Audit>>,
///     retries: u32,
/// }
///
/// impl Injectable for Service {
///     fn parameters() -> Vec<Parameter> {
///         vec![
///             Parameter::of::<Clock>("clock"),
///             Parameter::optional::<Audit>("audit"),
///             Parameter::of::<u32>("retries"),
///         ]
///     }
///
///     fn construct(args: &mut Arguments) -> DiResult<Self> {
///         Ok(Service {
///             clock: args.get()?,
///             audit: args.optional()?,
///             retries: args.value()?,
///         })
///     }
/// }
/// ```
pub struct Arguments {
    implementation: &'static str,
    values: Vec<Option<Argument>>,
    next: usize,
}

impl Arguments {
    pub(crate) fn new(implementation: &'static str, values: Vec<Argument>) -> Self {
        Self {
            implementation,
            values: values.into_iter().map(Some).collect(),
            next: 0,
        }
    }

    fn take(&mut self) -> DiResult<(usize, Argument)> {
        let index = self.next;
        self.next += 1;
        match self.values.get_mut(index).and_then(Option::take) {
            Some(argument) => Ok((index, argument)),
            None => Err(self.mismatch(index)),
        }
    }

    fn mismatch(&self, index: usize) -> DiError {
        DiError::ArgumentMismatch {
            implementation: self.implementation,
            index,
        }
    }

    /// Next argument as a required service.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        let index = self.next;
        self.optional::<T>()?.ok_or(self.mismatch(index))
    }

    /// Next argument as a service that may have been left unresolved.
    pub fn optional<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Option<Arc<T>>> {
        match self.take()? {
            (_, Argument::Value(None)) => Ok(None),
            (_, Argument::Value(Some(instance))) => instance
                .downcast::<T>()
                .map(Some)
                .ok_or(DiError::TypeMismatch(std::any::type_name::<T>())),
            (index, _) => Err(self.mismatch(index)),
        }
    }

    /// Next argument cloned out of its `Arc`, for constants and small values.
    pub fn value<T: Clone + Send + Sync + 'static>(&mut self) -> DiResult<T> {
        self.get::<T>().map(|v| T::clone(&v))
    }

    pub fn lazy<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Lazy<T>> {
        match self.take()? {
            (_, Argument::Deferred(request)) if request.kind() == DeferredKind::Lazy => Ok(Lazy::new(request)),
            (index, _) => Err(self.mismatch(index)),
        }
    }

    pub fn factory<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<FactoryOf<T>> {
        match self.take()? {
            (_, Argument::Deferred(request)) if request.kind() == DeferredKind::Factory => {
                Ok(FactoryOf::new(request))
            }
            (index, _) => Err(self.mismatch(index)),
        }
    }

    pub fn resolution_scope(&mut self) -> DiResult<ResolutionScope> {
        match self.take()? {
            (_, Argument::Scope(scope)) => Ok(scope),
            (index, _) => Err(self.mismatch(index)),
        }
    }

    /// Number of arguments not yet consumed.
    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_are_consumed_in_order() {
        let mut args = Arguments::new(
            "Test",
            vec![
                Argument::Value(Some(Instance::new(Arc::new(5u8)))),
                Argument::Value(None),
            ],
        );
        assert_eq!(args.remaining(), 2);
        assert_eq!(args.value::<u8>().unwrap(), 5);
        assert!(args.optional::<String>().unwrap().is_none());
        assert!(matches!(args.get::<u8>(), Err(DiError::ArgumentMismatch { index: 2, .. })));
    }

    #[test]
    fn absent_value_is_a_mismatch_for_required_get() {
        let mut args = Arguments::new("Test", vec![Argument::Value(None)]);
        assert!(matches!(args.get::<u8>(), Err(DiError::ArgumentMismatch { index: 0, .. })));
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut args = Arguments::new("Test", vec![Argument::Value(Some(Instance::new(Arc::new(1u16))))]);
        assert!(matches!(args.get::<u32>(), Err(DiError::TypeMismatch(_))));
    }
}
