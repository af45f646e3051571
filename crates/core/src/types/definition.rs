use crate::diagnostic::{Diagnostic, ErrorKind, Result};
use crate::value::ValueContainer;

use super::binary_template::BinaryTemplate;
use super::code::TypeCode;
use super::constructor::TypeConstructor;
use super::decorator::Decorators;
use super::field::{FieldValue, TypeField};

/// A declared resource type. Immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub name: String,
    pub code: TypeCode,
    pub template: BinaryTemplate,
    pub fields: Vec<TypeField>,
    pub constructors: Vec<TypeConstructor>,
    pub decorators: Decorators,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, code: TypeCode) -> Self {
        TypeDefinition {
            name: name.into(),
            code,
            template: BinaryTemplate::default(),
            fields: Vec::new(),
            constructors: Vec::new(),
            decorators: Decorators::default(),
        }
    }

    pub fn field_named(&self, name: &str) -> Option<&TypeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn add_field(&mut self, field: TypeField) -> Result<()> {
        if self.field_named(&field.name).is_some() {
            return Err(Diagnostic::new(
                ErrorKind::DuplicateDefinition,
                format!("field '{}' is declared twice in type '{}'", field.name, self.name),
            ));
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn add_constructor(&mut self, constructor: TypeConstructor) -> Result<()> {
        if self.constructor_for(constructor.arity()).is_some() {
            return Err(Diagnostic::new(
                ErrorKind::DuplicateDefinition,
                format!(
                    "type '{}' already has a constructor taking {} argument(s)",
                    self.name,
                    constructor.arity()
                ),
            ));
        }
        self.constructors.push(constructor);
        Ok(())
    }

    pub fn constructor_for(&self, arity: usize) -> Option<&TypeConstructor> {
        self.constructors.iter().find(|c| c.arity() == arity)
    }

    /// The field value bound to template slot `slot`, with its field.
    pub fn value_for_slot(&self, slot: &str) -> Option<(&TypeField, &FieldValue)> {
        self.fields
            .iter()
            .find_map(|f| f.value_for_slot(slot).map(|v| (f, v)))
    }

    /// Declared default for template slot `slot`.
    pub fn default_for(&self, slot: &str) -> Option<&ValueContainer> {
        self.value_for_slot(slot).and_then(|(_, v)| v.default.as_ref())
    }
}
