use std::collections::HashMap;

use tracing::debug;

use crate::diagnostic::{code, Diagnostic, ErrorKind, Result};
use crate::hash::hash_name;

use super::code::TypeCode;
use super::definition::TypeDefinition;

/// Type definitions known to one compilation, keyed by name hash.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    definitions: Vec<TypeDefinition>,
    by_name: HashMap<u64, usize>,
    by_code: HashMap<TypeCode, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Register `definition`. Names and type codes must both be unique.
    pub fn register(&mut self, definition: TypeDefinition) -> Result<&TypeDefinition> {
        if let Some(existing) = self.get(&definition.name) {
            return Err(Diagnostic::new(
                ErrorKind::DuplicateDefinition,
                format!("type '{}' is already defined", existing.name),
            )
            .with_code(code::DUPLICATE_DEFINITION));
        }
        if let Some(existing) = self.by_code(definition.code) {
            return Err(Diagnostic::new(
                ErrorKind::DuplicateDefinition,
                format!(
                    "type code '{}' of '{}' is already used by '{}'",
                    definition.code, definition.name, existing.name
                ),
            ));
        }
        debug!(name = %definition.name, code = %definition.code, "registered type");
        let index = self.definitions.len();
        self.by_name.insert(hash_name(&definition.name), index);
        self.by_code.insert(definition.code, index);
        self.definitions.push(definition);
        Ok(&self.definitions[index])
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.by_name
            .get(&hash_name(name))
            .map(|&i| &self.definitions[i])
            .filter(|d| d.name == name)
    }

    pub fn by_code(&self, code: TypeCode) -> Option<&TypeDefinition> {
        self.by_code.get(&code).map(|&i| &self.definitions[i])
    }

    /// Definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.definitions.iter()
    }
}
