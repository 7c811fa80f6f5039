//! Plan compiler, plan cache and plan execution.
//!
//! A plan is a closure tree compiled once from a resolved request tree. It
//! holds the selected factories, constants as literals and deferred requests,
//! and decides per node whether to construct, reuse from a scope, or call
//! back into the container.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::arguments::{Argument, Arguments};
use crate::error::{DiError, DiResult};
use crate::internal::ConstructionGuard;
use crate::key::{Metadata, ServiceKey, TypeInfo};
use crate::provider::{ContainerInner, ExecContext, ResolverContext, ScopeData};
use crate::registration::{Created, Factory, FactoryId, FactoryKind, Instance};
use crate::request::ServiceRequest;
use crate::resolution::ResolvedNode;
use crate::reuse::{Reuse, ScopeName};
use crate::rules::{Literal, Rules};
use crate::wrappers::{DeferredKind, DeferredRequest, ResolutionScope};

/// Cache key of a compiled plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    pub service_type: TypeInfo,
    pub required_service_type: Option<TypeInfo>,
    pub service_key: Option<ServiceKey>,
    pub metadata: Option<Metadata>,
}

impl PlanKey {
    pub(crate) fn of(request: &ServiceRequest) -> Self {
        Self {
            service_type: request.service_type(),
            required_service_type: None,
            service_key: request.service_key().cloned(),
            metadata: request.metadata().cloned(),
        }
    }
}

/// Structural identity of a compiled plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub key: PlanKey,
    pub factory: FactoryId,
    pub reuse: Reuse,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key.service_type)?;
        if let Some(key) = &self.key.service_key {
            write!(f, " {}", key)?;
        }
        write!(f, " via {} ({})", self.factory, self.reuse)
    }
}

enum PlanNode {
    Absent,
    Constant(Literal),
    Create(Box<CreateNode>),
    ResolutionCall(ServiceRequest),
    Deferred(ServiceRequest, DeferredKind),
    ResolutionScope,
}

struct CreateNode {
    factory: Arc<Factory>,
    args: Vec<PlanNode>,
    track_transient: bool,
    // Singleton held inline when eager caching is on
    eager: Option<OnceCell<Instance>>,
}

/// A compiled, executable resolution.
///
/// Obtained from [`Container::plan`](crate::Container::plan) for diagnostics.
pub struct Plan {
    fingerprint: Fingerprint,
    root: CreateNode,
}

impl Plan {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Indented tree of the steps the plan performs.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.root.describe(&mut out, 0);
        out
    }

    pub(crate) fn execute(&self, ctx: &ExecContext<'_>) -> DiResult<Instance> {
        self.root.create(ctx)
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan").field("fingerprint", &self.fingerprint).finish()
    }
}

/// Compiles a resolved tree. Returns `None` when the root is absent.
pub(crate) fn compile(request: &ServiceRequest, tree: ResolvedNode, rules: &Rules) -> DiResult<Option<Plan>> {
    let ResolvedNode::Service { factory, dependencies } = tree else {
        return Ok(None);
    };
    let fingerprint = Fingerprint {
        key: PlanKey::of(request),
        factory: factory.id(),
        reuse: factory.reuse().clone(),
    };
    let root = compile_create(factory, dependencies, rules)?;
    Ok(Some(Plan { fingerprint, root }))
}

fn compile_create(factory: Arc<Factory>, dependencies: Vec<ResolvedNode>, rules: &Rules) -> DiResult<CreateNode> {
    let args = dependencies
        .into_iter()
        .map(|node| compile_node(node, rules))
        .collect::<DiResult<Vec<_>>>()?;

    let track_transient = factory.reuse().is_transient()
        && (rules.track_disposable_transients() || factory.setup().track_disposable_transient);
    let eager = (matches!(factory.reuse(), Reuse::Singleton) && rules.eager_caching_singletons()).then(OnceCell::new);

    Ok(CreateNode {
        factory,
        args,
        track_transient,
        eager,
    })
}

fn compile_node(node: ResolvedNode, rules: &Rules) -> DiResult<PlanNode> {
    Ok(match node {
        ResolvedNode::Absent => PlanNode::Absent,
        ResolvedNode::Constant(item) => PlanNode::Constant(rules.literal_for(&item)?),
        ResolvedNode::Service { factory, dependencies } => {
            PlanNode::Create(Box::new(compile_create(factory, dependencies, rules)?))
        }
        ResolvedNode::ResolutionCall(request) => PlanNode::ResolutionCall(request),
        ResolvedNode::Deferred(request, kind) => PlanNode::Deferred(request, kind),
        ResolvedNode::ResolutionScope => PlanNode::ResolutionScope,
    })
}

impl PlanNode {
    fn evaluate(&self, ctx: &ExecContext<'_>) -> DiResult<Argument> {
        match self {
            PlanNode::Absent => Ok(Argument::Value(None)),
            PlanNode::Constant(literal) => Ok(Argument::Value(Some(literal.produce()))),
            PlanNode::Create(node) => node.create(ctx).map(|i| Argument::Value(Some(i))),
            PlanNode::ResolutionCall(request) => ContainerInner::resolve_in(ctx, request).map(Argument::Value),
            PlanNode::Deferred(request, kind) => Ok(Argument::Deferred(DeferredRequest::capture(
                request.clone(),
                *kind,
                ctx,
            ))),
            PlanNode::ResolutionScope => ctx
                .resolution
                .clone()
                .map(|scope| Argument::Scope(ResolutionScope::new(scope)))
                .ok_or(DiError::NoMatchingScopeFound {
                    service: std::any::type_name::<ResolutionScope>(),
                    scope: None,
                }),
        }
    }

    fn describe(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            PlanNode::Absent => {
                let _ = writeln!(out, "{}absent", indent);
            }
            PlanNode::Constant(literal) => {
                let _ = writeln!(out, "{}{}", indent, literal.description());
            }
            PlanNode::Create(node) => node.describe(out, depth),
            PlanNode::ResolutionCall(request) => {
                let _ = writeln!(out, "{}resolution call {}", indent, request);
            }
            PlanNode::Deferred(request, DeferredKind::Lazy) => {
                let _ = writeln!(out, "{}lazy {}", indent, request);
            }
            PlanNode::Deferred(request, DeferredKind::Factory) => {
                let _ = writeln!(out, "{}factory of {}", indent, request);
            }
            PlanNode::ResolutionScope => {
                let _ = writeln!(out, "{}resolution scope handle", indent);
            }
        }
    }
}

impl CreateNode {
    fn name(&self) -> &'static str {
        self.factory
            .implementation_type()
            .unwrap_or_else(|| self.factory.service_type())
            .name()
    }

    fn create(&self, ctx: &ExecContext<'_>) -> DiResult<Instance> {
        let factory = &self.factory;
        match factory.reuse() {
            Reuse::Transient => {
                let _guard = ConstructionGuard::enter(factory.id(), self.name())?;
                let created = self.construct(ctx)?;
                if let Some(disposer) = created.disposer {
                    match (&ctx.owner, self.track_transient) {
                        (Some(owner), true) => owner.track(disposer),
                        _ => tracing::trace!(service = self.name(), "disposable transient not tracked"),
                    }
                }
                Ok(created.instance)
            }
            Reuse::Singleton => {
                if let Some(instance) = self.eager.as_ref().and_then(OnceCell::get) {
                    return Ok(instance.clone());
                }
                let scope = ctx.container.singletons().clone();
                let instance = self.reuse_in(&scope, &ctx.for_singleton())?;
                if let Some(cell) = &self.eager {
                    let _ = cell.set(instance.clone());
                }
                Ok(instance)
            }
            Reuse::Scoped { name } => {
                let scope = ctx.find_ambient(name.as_ref()).ok_or_else(|| DiError::NoMatchingScopeFound {
                    service: factory.service_type().name(),
                    scope: name.as_ref().map(ToString::to_string),
                })?;
                self.reuse_in(&scope, &ctx.with_ambient(scope.clone()))
            }
            Reuse::InResolutionScopeOf { anchor, key } => {
                let scope = ctx
                    .find_resolution(*anchor, key.as_ref())
                    .ok_or_else(|| DiError::NoMatchingScopeFound {
                        service: factory.service_type().name(),
                        scope: Some(factory.reuse().to_string()),
                    })?;
                self.reuse_in(&scope, &ctx.with_owner(scope.clone()))
            }
        }
    }

    /// Get-or-create in `scope`; the scope owns the instance's disposal.
    fn reuse_in(&self, scope: &Arc<ScopeData>, ctx: &ExecContext<'_>) -> DiResult<Instance> {
        scope.get_or_create(self.factory.id(), self.name(), || {
            let created = self.construct(ctx)?;
            if let Some(disposer) = created.disposer {
                scope.track(disposer);
            }
            Ok(created.instance)
        })
    }

    fn construct(&self, ctx: &ExecContext<'_>) -> DiResult<Created> {
        let factory = &self.factory;
        let opened;
        let ctx = if factory.setup().open_resolution_scope {
            let name = ScopeName::Resolution {
                service: factory.service_type(),
                key: factory.service_key().cloned(),
            };
            let scope = ScopeData::resolution(ctx.resolution.as_ref(), name);
            tracing::trace!(scope = scope.id(), service = factory.service_type().name(), "opened resolution scope");
            opened = ctx.with_resolution(scope);
            &opened
        } else {
            ctx
        };

        match &factory.kind {
            FactoryKind::Implementation(implementation) => {
                let values = self
                    .args
                    .iter()
                    .map(|arg| arg.evaluate(ctx))
                    .collect::<DiResult<Vec<_>>>()?;
                let mut args = Arguments::new(implementation.type_info().name(), values);
                (implementation.construct)(&mut args)
            }
            FactoryKind::Delegate(delegate) => Ok(Created {
                instance: delegate(&ResolverContext::new(ctx))?,
                disposer: None,
            }),
            FactoryKind::Instance(instance) => Ok(Created {
                instance: instance.clone(),
                disposer: None,
            }),
        }
    }

    fn describe(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let factory = &self.factory;
        let _ = write!(out, "{}{} <- {} [{}]", indent, factory.service_type(), self.name(), factory.describe_kind());
        match factory.reuse() {
            Reuse::Singleton if self.eager.is_some() => out.push_str(" singleton (eager)"),
            Reuse::Singleton => out.push_str(" singleton (singleton-scope lookup)"),
            Reuse::Transient if self.track_transient => out.push_str(" transient (tracked)"),
            reuse => {
                let _ = write!(out, " {}", reuse);
            }
        }
        if factory.setup().open_resolution_scope {
            out.push_str(" opens resolution scope");
        }
        out.push('\n');
        for arg in &self.args {
            arg.describe(out, depth + 1);
        }
    }
}

/// Compiled plans by key. Eviction is explicit only.
#[derive(Default)]
pub(crate) struct PlanCache {
    plans: DashMap<PlanKey, Arc<Plan>>,
}

impl PlanCache {
    pub(crate) fn get(&self, key: &PlanKey) -> Option<Arc<Plan>> {
        self.plans.get(key).map(|plan| plan.value().clone())
    }

    /// Stores a plan unless another thread stored one first; returns the winner.
    pub(crate) fn insert(&self, key: PlanKey, plan: Plan) -> Arc<Plan> {
        self.plans.entry(key).or_insert_with(|| Arc::new(plan)).value().clone()
    }

    pub(crate) fn clear(&self) {
        self.plans.clear();
    }

    /// Independent cache starting with the current entries.
    pub(crate) fn snapshot(&self) -> PlanCache {
        let plans = DashMap::with_capacity(self.plans.len());
        for entry in self.plans.iter() {
            plans.insert(entry.key().clone(), entry.value().clone());
        }
        PlanCache { plans }
    }

    pub(crate) fn len(&self) -> usize {
        self.plans.len()
    }
}
