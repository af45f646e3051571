use std::collections::BTreeMap;

use tracing::debug;

use crate::diagnostic::{Diagnostic, ErrorKind, Result};
use crate::reference::ResourceReference;
use crate::types::TypeCode;

use super::instance::Instance;
use super::keyed::{Keyed, KeyedMap};

/// Instances of one type within one namespace, ordered by id.
#[derive(Debug, Clone)]
pub struct ResourceContainer {
    code: TypeCode,
    key: String,
    instances: BTreeMap<i64, Instance>,
}

impl Keyed for ResourceContainer {
    fn key(&self) -> &str {
        &self.key
    }
}

impl ResourceContainer {
    pub fn new(code: TypeCode) -> Self {
        ResourceContainer {
            code,
            key: code.to_string(),
            instances: BTreeMap::new(),
        }
    }

    pub fn code(&self) -> TypeCode {
        self.code
    }

    /// Create the instance `reference`. A second construction with the same
    /// id fails with a duplicate-resource diagnostic.
    pub fn construct(&mut self, reference: ResourceReference, name: &str) -> Result<&mut Instance> {
        let id = reference.id;
        if self.instances.contains_key(&id) {
            return Err(Diagnostic::new(
                ErrorKind::DuplicateResource,
                format!("resource {} already exists", reference),
            ));
        }
        debug!(resource = %reference, name, "constructed resource");
        Ok(self
            .instances
            .entry(id)
            .or_insert_with(|| Instance::new(reference, self.code, name)))
    }

    /// Store a fully built instance, as `duplicate` does.
    pub fn insert(&mut self, instance: Instance) -> Result<&mut Instance> {
        let id = instance.id();
        if self.instances.contains_key(&id) {
            return Err(Diagnostic::new(
                ErrorKind::DuplicateResource,
                format!("resource {} already exists", instance.reference),
            ));
        }
        Ok(self.instances.entry(id).or_insert(instance))
    }

    pub fn instance(&self, id: i64) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn instance_mut(&mut self, id: i64) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    /// Lowest id at or above `start` that is not yet taken.
    pub fn next_free_id(&self, start: i64) -> Result<i64> {
        let mut id = start;
        while self.instances.contains_key(&id) {
            id = id.checked_add(1).ok_or_else(|| {
                Diagnostic::new(
                    ErrorKind::InvalidValue,
                    format!("no free '{}' resource id at or above {}", self.code, start),
                )
            })?;
        }
        Ok(id)
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    pub fn instances_mut(&mut self) -> impl Iterator<Item = &mut Instance> {
        self.instances.values_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// A namespace; the empty name is the global namespace.
#[derive(Debug, Clone)]
pub struct NamedContainer {
    name: String,
    containers: KeyedMap<ResourceContainer>,
}

impl Keyed for NamedContainer {
    fn key(&self) -> &str {
        &self.name
    }
}

impl NamedContainer {
    pub fn new(name: impl Into<String>) -> Self {
        NamedContainer {
            name: name.into(),
            containers: KeyedMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_global(&self) -> bool {
        self.name.is_empty()
    }

    pub fn resource_container(
        &mut self,
        code: TypeCode,
        allow_creation: bool,
    ) -> Option<&mut ResourceContainer> {
        self.containers
            .get_or_create(&code.to_string(), allow_creation, || ResourceContainer::new(code))
    }

    pub fn get(&self, code: TypeCode) -> Option<&ResourceContainer> {
        self.containers.get(&code.to_string())
    }

    pub fn resource_containers(&self) -> impl Iterator<Item = &ResourceContainer> {
        self.containers.iter()
    }

    pub fn resource_containers_mut(&mut self) -> impl Iterator<Item = &mut ResourceContainer> {
        self.containers.iter_mut()
    }
}
