//! # ferrous-resolver
//!
//! Dependency resolution runtime with compiled resolution plans, reuse
//! policies, scopes and owned disposal.
//!
//! ## Features
//!
//! - **Registry with policies**: keyed and default registrations, metadata,
//!   `IfAlreadyRegistered` handling and a disposable-transient check
//! - **Immutable rules**: copy-on-write policy object covering unknown-service
//!   fallbacks, factory selection, constant conversion and tracking
//! - **Compiled plans**: every distinct request is resolved once into a plan
//!   that is cached and reused
//! - **Reuse**: transient, singleton, named ambient scopes and resolution
//!   scopes anchored at a service
//! - **Deferred wrappers**: `Lazy<T>` and `FactoryOf<T>` break static cycles
//! - **Disposal**: scopes dispose what they own, in reverse creation order,
//!   exactly once
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_resolver::{Arguments, Container, DiResult, Injectable, Parameter, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! impl Injectable for Database {
//!     fn construct(_: &mut Arguments) -> DiResult<Self> {
//!         Ok(Database { connection_string: "postgres://localhost".to_string() })
//!     }
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn parameters() -> Vec<Parameter> {
//!         vec![Parameter::of::<Database>("db")]
//!     }
//!
//!     fn construct(args: &mut Arguments) -> DiResult<Self> {
//!         Ok(UserService { db: args.get()? })
//!     }
//! }
//!
//! let container = Container::new();
//! container.register_singleton::<Database>().unwrap();
//! container.register_transient::<UserService>().unwrap();
//!
//! let user_service = container.resolve::<UserService>().unwrap();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Reuse
//!
//! - **Transient**: a new instance on every resolution
//! - **Singleton**: one instance per container, owned by the singleton scope
//! - **Scoped**: one instance per ambient scope, optionally bound to a named one
//! - **InResolutionScopeOf**: one instance per resolution scope opened by an
//!   anchor service
//!
//! ## Trait Services
//!
//! ```rust
//! use ferrous_resolver::{Arguments, Container, DiResult, Injectable, Registration, Resolver, Reuse};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[LOG] {}", message)
//!     }
//! }
//! impl Injectable for ConsoleLogger {
//!     fn construct(_: &mut Arguments) -> DiResult<Self> { Ok(ConsoleLogger) }
//! }
//!
//! let container = Container::new();
//! container
//!     .register(Registration::<dyn Logger>::implemented_by::<ConsoleLogger>(|l| l as Arc<dyn Logger>).reuse(Reuse::Singleton))
//!     .unwrap();
//!
//! let logger = container.resolve::<dyn Logger>().unwrap();
//! assert_eq!(logger.log("hello"), "[LOG] hello");
//! ```

pub mod arguments;
pub mod capabilities;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod fallback;
pub mod key;
pub mod observer;
pub mod plan;
pub mod provider;
pub mod registration;
pub mod request;
pub mod reuse;
pub mod rules;
pub mod traits;
pub mod wrappers;

mod internal;
mod registry;
mod resolution;

pub use arguments::Arguments;
pub use capabilities::{CapabilityProvider, DeclaredParameters, Dependency, DependencyKind, Parameter, ParameterRule};
pub use config::RulesConfig;
pub use descriptors::ServiceDescriptor;
pub use error::{DiError, DiResult};
pub use fallback::AutoFallback;
pub use key::{Metadata, ServiceKey, TypeInfo};
pub use observer::{ResolutionObserver, TracingObserver};
pub use plan::{Fingerprint, Plan, PlanKey};
pub use provider::{Container, ResolverContext, Scope};
pub use registration::{Factory, FactoryId, IfAlreadyRegistered, Implementation, Injectable, Instance, Registration, Setup};
pub use request::{IfUnresolved, Request, RequestKind, ServiceRequest};
pub use reuse::{Reuse, ScopeName};
pub use rules::{FactorySelector, Item, Literal, Rules, UnknownServiceResolver};
pub use traits::{AsyncDispose, Dispose, Resolver, ResolverCore};
pub use wrappers::{DeferredKind, DeferredRequest, FactoryOf, Lazy, ResolutionScope};
