//! Copy-on-write registry of factories.
//!
//! Readers load an immutable snapshot without locking; writers serialize on a
//! mutex, clone the snapshot, apply the change and publish it.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::key::{ServiceKey, TypeInfo};
use crate::registration::{Factory, IfAlreadyRegistered};
use crate::rules::Rules;

#[derive(Clone, Default)]
struct ServiceEntry {
    defaults: Vec<Arc<Factory>>,
    // Insertion-ordered so descriptors list keys as registered
    keyed: Vec<(ServiceKey, Vec<Arc<Factory>>)>,
}

impl ServiceEntry {
    fn list(&self, key: Option<&ServiceKey>) -> &[Arc<Factory>] {
        match key {
            None => &self.defaults,
            Some(key) => self
                .keyed
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, list)| list.as_slice())
                .unwrap_or(&[]),
        }
    }

    fn list_mut(&mut self, key: Option<&ServiceKey>) -> &mut Vec<Arc<Factory>> {
        let Some(key) = key else {
            return &mut self.defaults;
        };
        let pos = match self.keyed.iter().position(|(k, _)| k == key) {
            Some(pos) => pos,
            None => {
                self.keyed.push((key.clone(), Vec::new()));
                self.keyed.len() - 1
            }
        };
        &mut self.keyed[pos].1
    }

    fn factories(&self) -> impl Iterator<Item = &Arc<Factory>> {
        self.defaults.iter().chain(self.keyed.iter().flat_map(|(_, list)| list.iter()))
    }
}

/// Immutable registry snapshot.
#[derive(Clone, Default)]
pub(crate) struct Registry {
    services: HashMap<TypeInfo, Arc<ServiceEntry>>,
    // Service types in first-registration order
    order: Vec<TypeInfo>,
}

impl Registry {
    /// Ordered candidates for `(service_type, key)`; empty when none.
    pub(crate) fn lookup(&self, service_type: TypeInfo, key: Option<&ServiceKey>) -> &[Arc<Factory>] {
        self.services.get(&service_type).map(|entry| entry.list(key)).unwrap_or(&[])
    }

    pub(crate) fn is_registered(&self, service_type: TypeInfo, key: Option<&ServiceKey>) -> bool {
        !self.lookup(service_type, key).is_empty()
    }

    pub(crate) fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.order
            .iter()
            .filter_map(|t| self.services.get(t))
            .flat_map(|entry| entry.factories())
            .map(|f| ServiceDescriptor::of(f))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.services.values().map(|entry| entry.factories().count()).sum()
    }

    /// Applies `policy` and stores the factory. Returns false when kept out.
    fn insert(&mut self, factory: Arc<Factory>, policy: IfAlreadyRegistered) -> DiResult<bool> {
        let service_type = factory.service_type();
        if !self.services.contains_key(&service_type) {
            self.order.push(service_type);
        }
        let entry = Arc::make_mut(self.services.entry(service_type).or_default());
        let key = factory.service_key().cloned();
        let list = entry.list_mut(key.as_ref());

        if list.is_empty() {
            list.push(factory);
            return Ok(true);
        }

        let already_registered = || DiError::ServiceIsAlreadyRegistered {
            service: service_type.name(),
            key: key.clone(),
        };

        match policy {
            IfAlreadyRegistered::Throw => Err(already_registered()),
            IfAlreadyRegistered::Keep => Ok(false),
            IfAlreadyRegistered::Replace => {
                list.clear();
                list.push(factory);
                Ok(true)
            }
            IfAlreadyRegistered::AppendNotKeyed if key.is_some() => Err(already_registered()),
            IfAlreadyRegistered::AppendNotKeyed => {
                list.push(factory);
                Ok(true)
            }
            IfAlreadyRegistered::ReplaceMany => {
                let implementation = factory.implementation_type();
                let same = list
                    .iter()
                    .position(|f| implementation.is_some() && f.implementation_type() == implementation);
                match same {
                    Some(pos) => list[pos] = factory,
                    None => list.push(factory),
                }
                Ok(true)
            }
        }
    }
}

/// Published registry plus the writer lock.
pub(crate) struct RegistryCell {
    current: ArcSwap<Registry>,
    write: Mutex<()>,
}

impl RegistryCell {
    pub(crate) fn new(registry: Registry) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
            write: Mutex::new(()),
        }
    }

    pub(crate) fn load(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Validates and stores a factory.
    ///
    /// `policy` is the per-call override; the rules default applies otherwise.
    pub(crate) fn register(
        &self,
        factory: Arc<Factory>,
        policy: Option<IfAlreadyRegistered>,
        rules: &Rules,
    ) -> DiResult<bool> {
        check_disposable_transient(&factory, rules)?;

        let policy = policy.unwrap_or_else(|| rules.default_if_already_registered());
        let _guard = self.write.lock();
        let mut next = Registry::clone(&self.current.load());
        let stored = next.insert(factory.clone(), policy)?;
        if stored {
            self.current.store(Arc::new(next));
            tracing::debug!(
                service = factory.service_type().name(),
                key = ?factory.service_key(),
                reuse = %factory.reuse(),
                ?policy,
                "registered factory"
            );
        } else {
            tracing::trace!(service = factory.service_type().name(), "registration kept out by policy");
        }
        Ok(stored)
    }
}

fn check_disposable_transient(factory: &Factory, rules: &Rules) -> DiResult<()> {
    let setup = factory.setup();
    let rejected = factory.reuse().is_transient()
        && factory.is_disposable()
        && rules.throw_on_registering_disposable_transient()
        && !rules.track_disposable_transients()
        && !setup.allow_disposable_transient
        && !setup.track_disposable_transient;

    if rejected {
        return Err(DiError::RegisteredDisposableTransientWontBeDisposedByContainer {
            service: factory.service_type().name(),
            implementation: factory.implementation_type().map(|t| t.name()).unwrap_or("<delegate>"),
        });
    }
    Ok(())
}
