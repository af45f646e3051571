use std::collections::BTreeMap;

use crate::reference::ResourceReference;
use crate::types::TypeCode;
use crate::value::ValueContainer;

/// One declared resource and its resolved field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub reference: ResourceReference,
    pub type_code: TypeCode,
    pub name: String,
    /// Resolved values keyed by slot path (`Label`, `Group[2]`, `Nested.Label`).
    pub values: BTreeMap<String, ValueContainer>,
    /// Encoded payload, filled in once the owning unit is encoded.
    pub data: Vec<u8>,
}

impl Instance {
    pub fn new(reference: ResourceReference, type_code: TypeCode, name: impl Into<String>) -> Self {
        Instance {
            reference,
            type_code,
            name: name.into(),
            values: BTreeMap::new(),
            data: Vec::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.reference.id
    }

    pub fn type_name(&self) -> &str {
        self.reference.type_name.as_deref().unwrap_or_default()
    }

    pub fn container(&self) -> &str {
        self.reference.container.as_deref().unwrap_or_default()
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: ValueContainer) {
        self.values.insert(key.into(), value);
    }

    pub fn value(&self, key: &str) -> Option<&ValueContainer> {
        self.values.get(key)
    }
}

/// A compiled resource as handed to a container writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Namespace name; empty for the global namespace.
    pub container: String,
    pub type_code: TypeCode,
    pub type_name: String,
    pub id: i64,
    pub name: String,
    pub data: Vec<u8>,
}

impl From<&Instance> for ResourceEntry {
    fn from(instance: &Instance) -> Self {
        ResourceEntry {
            container: instance.container().to_owned(),
            type_code: instance.type_code,
            type_name: instance.type_name().to_owned(),
            id: instance.id(),
            name: instance.name.clone(),
            data: instance.data.clone(),
        }
    }
}
