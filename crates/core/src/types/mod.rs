//! Declarative schema layer: binary templates, fields, constructors and the
//! registry of type definitions.

pub mod binary_template;
pub mod code;
pub mod constructor;
pub mod decorator;
pub mod definition;
pub mod field;
pub mod registry;

pub use binary_template::{BinaryField, BinaryKind, BinaryTemplate};
pub use code::TypeCode;
pub use constructor::TypeConstructor;
pub use decorator::{Decorator, Decorators};
pub use definition::TypeDefinition;
pub use field::{FieldValue, Repeatable, SymbolList, TypeField};
pub use registry::TypeRegistry;
