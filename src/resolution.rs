//! Request graph resolver.
//!
//! Walks from a root request through factory selection and declared
//! dependencies, producing a resolved tree ready for plan compilation.
//! Deferred dependencies and resolution calls become leaves; they are
//! resolved again when the plan runs.

use std::sync::Arc;

use crate::capabilities::{Dependency, DependencyKind};
use crate::error::{DiError, DiResult};
use crate::internal::MAX_DEPTH;
use crate::registration::{Factory, FactoryKind};
use crate::registry::Registry;
use crate::request::{IfUnresolved, RequestArena, RequestId, RequestKind, RequestNode, ServiceRequest};
use crate::rules::{Item, Rules};
use crate::wrappers::DeferredKind;

pub(crate) enum ResolvedNode {
    /// Unresolved with `ReturnDefault`.
    Absent,
    Constant(Item),
    Service {
        factory: Arc<Factory>,
        dependencies: Vec<ResolvedNode>,
    },
    /// Resolved through a nested container call at run time.
    ResolutionCall(ServiceRequest),
    Deferred(ServiceRequest, DeferredKind),
    ResolutionScope,
}

/// Resolves the tree rooted at `request`.
pub(crate) fn resolve(registry: &Registry, rules: &Rules, request: &ServiceRequest) -> DiResult<ResolvedNode> {
    let mut resolver = GraphResolver {
        registry,
        rules,
        arena: RequestArena::default(),
    };
    let root = resolver.arena.push(RequestNode {
        service_type: request.service_type(),
        required_service_type: None,
        service_key: request.service_key().cloned(),
        if_unresolved: request.unresolved_policy(),
        metadata: request.metadata().cloned(),
        kind: RequestKind::Service,
        parent: None,
    });
    resolver.resolve_service(root)
}

struct GraphResolver<'a> {
    registry: &'a Registry,
    rules: &'a Rules,
    arena: RequestArena,
}

impl GraphResolver<'_> {
    fn resolve_service(&mut self, id: RequestId) -> DiResult<ResolvedNode> {
        let depth = self.arena.view(id).depth();
        if depth >= MAX_DEPTH {
            return Err(DiError::DepthExceeded(depth));
        }
        self.check_cycle(id)?;

        let Some(factory) = self.select_factory(id)? else {
            return Ok(ResolvedNode::Absent);
        };
        self.arena.set_factory(id, factory.clone());

        let is_root = self.arena.view(id).is_root();
        if !is_root && factory.setup().as_resolution_call {
            return Ok(ResolvedNode::ResolutionCall(self.service_request(id)));
        }

        let dependencies = match &factory.kind {
            FactoryKind::Implementation(implementation) => {
                let declared = self
                    .rules
                    .capabilities()
                    .dependencies(implementation, &self.arena.view(id))?;
                declared
                    .into_iter()
                    .map(|dependency| self.resolve_dependency(id, dependency))
                    .collect::<DiResult<Vec<_>>>()?
            }
            FactoryKind::Delegate(_) | FactoryKind::Instance(_) => Vec::new(),
        };

        Ok(ResolvedNode::Service { factory, dependencies })
    }

    fn resolve_dependency(&mut self, parent: RequestId, dependency: Dependency) -> DiResult<ResolvedNode> {
        if let Some(value) = dependency.value {
            return Ok(ResolvedNode::Constant(value));
        }
        if dependency.kind == DependencyKind::ResolutionScope {
            return Ok(ResolvedNode::ResolutionScope);
        }

        let id = self.arena.push(RequestNode {
            service_type: dependency.service_type,
            required_service_type: dependency.required_service_type,
            service_key: dependency.service_key,
            if_unresolved: dependency.if_unresolved,
            metadata: dependency.metadata,
            kind: dependency.kind.request_kind(),
            parent: Some(parent),
        });

        match dependency.kind {
            DependencyKind::Lazy => Ok(ResolvedNode::Deferred(self.service_request(id), DeferredKind::Lazy)),
            DependencyKind::Factory => Ok(ResolvedNode::Deferred(self.service_request(id), DeferredKind::Factory)),
            DependencyKind::Service | DependencyKind::ResolutionScope => self.resolve_service(id),
        }
    }

    /// Fails when an ancestor requests the same service identity eagerly.
    fn check_cycle(&self, id: RequestId) -> DiResult<()> {
        let request = self.arena.view(id);
        let service = request.lookup_type();
        let key = request.service_key();

        let recursive = request
            .ancestors()
            .any(|a| !a.kind().is_deferred() && a.lookup_type() == service && a.service_key() == key);
        if !recursive {
            return Ok(());
        }

        let mut path: Vec<&'static str> = request.ancestors().map(|a| a.lookup_type().name()).collect();
        path.reverse();
        path.push(service.name());
        tracing::debug!(path = ?path, "recursive dependency");
        Err(DiError::RecursiveDependencyDetected { path })
    }

    fn select_factory(&self, id: RequestId) -> DiResult<Option<Arc<Factory>>> {
        let request = self.arena.view(id);
        let service = request.lookup_type();

        let mut candidates: Vec<Arc<Factory>> = self
            .registry
            .lookup(service, request.service_key())
            .iter()
            .filter(|f| match request.metadata() {
                Some(required) => f.metadata() == Some(required),
                None => true,
            })
            .cloned()
            .collect();

        if candidates.is_empty() {
            let synthesized = self
                .rules
                .unknown_service_resolvers()
                .iter()
                .find_map(|resolver| resolver.resolve(&request));
            if let Some(factory) = synthesized {
                tracing::trace!(service = service.name(), "factory synthesized by unknown service resolver");
                candidates.push(factory);
            }
        }

        if let Some(factory) = self.rules.factory_selector().select(&request, &candidates) {
            return Ok(Some(factory));
        }

        if candidates.len() > 1 {
            return Err(DiError::AmbiguousRegistrations {
                service: service.name(),
                count: candidates.len(),
            });
        }

        match request.if_unresolved() {
            IfUnresolved::ReturnDefault => Ok(None),
            IfUnresolved::Throw => Err(DiError::UnableToResolveUnknownService {
                service: service.name(),
                key: request.service_key().cloned(),
            }),
        }
    }

    /// Top-level request equivalent to the node, for run-time resolution.
    fn service_request(&self, id: RequestId) -> ServiceRequest {
        let request = self.arena.view(id);
        ServiceRequest::for_type(request.lookup_type())
            .with_key(request.service_key().cloned())
            .if_unresolved(request.if_unresolved())
            .with_optional_metadata(request.metadata().cloned())
    }
}
