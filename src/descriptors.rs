//! Service descriptors for introspection and diagnostics.

use crate::key::{ServiceKey, TypeInfo};
use crate::registration::{Factory, FactoryId};
use crate::reuse::Reuse;

/// Snapshot of one stored registration.
///
/// # Use Cases
///
/// - **Debugging**: inspect what is registered and with which reuse
/// - **Validation**: check that required services are present at startup
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Arguments, Container, DiResult, Injectable, Registration, Reuse};
///
/// struct Database;
/// impl Injectable for Database {
///     fn construct(_: &mut Arguments) -> DiResult<Self> { Ok(Database) }
/// }
///
/// let container = Container::new();
/// container.register(Registration::<Database>::new().reuse(Reuse::Singleton)).unwrap();
/// container.register(Registration::<Database>::new().key("replica")).unwrap();
///
/// let descriptors = container.registrations();
/// assert_eq!(descriptors.len(), 2);
///
/// let replica = descriptors.iter().find(|d| d.is_keyed()).unwrap();
/// assert_eq!(replica.reuse, Reuse::Transient);
/// assert!(replica.type_name().ends_with("Database"));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub service_type: TypeInfo,
    pub service_key: Option<ServiceKey>,
    pub reuse: Reuse,
    /// Implementation type, absent for delegates and instances
    pub implementation_type: Option<TypeInfo>,
    pub factory_id: FactoryId,
    pub has_metadata: bool,
}

impl ServiceDescriptor {
    pub(crate) fn of(factory: &Factory) -> Self {
        Self {
            service_type: factory.service_type(),
            service_key: factory.service_key().cloned(),
            reuse: factory.reuse().clone(),
            implementation_type: factory.implementation_type(),
            factory_id: factory.id(),
            has_metadata: factory.metadata().is_some(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.service_type.name()
    }

    pub fn is_keyed(&self) -> bool {
        self.service_key.is_some()
    }
}
