use crate::value::ValueContainer;

use super::binary_template::BinaryKind;
use super::decorator::Decorators;

/// Name-to-literal enumeration attached to a field value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SymbolList {
    entries: Vec<(String, ValueContainer)>,
}

impl SymbolList {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns false if `name` is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: ValueContainer) -> bool {
        let name = name.into();
        if self.lookup(&name).is_some() {
            return false;
        }
        self.entries.push((name, value));
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&ValueContainer> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueContainer)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// One admissible value shape of a field, bound to a template slot.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    /// Label of the template slot this value is written to.
    pub slot: String,
    /// Slot kind as resolved against the template.
    pub kind: BinaryKind,
    pub default: Option<ValueContainer>,
    pub symbols: SymbolList,
}

impl FieldValue {
    pub fn new(slot: impl Into<String>, kind: BinaryKind) -> Self {
        FieldValue {
            slot: slot.into(),
            kind,
            default: None,
            symbols: SymbolList::default(),
        }
    }
}

/// Inclusive bounds on how often a repeatable field may be given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeatable {
    pub lower: usize,
    pub upper: usize,
    /// Label of the `OCNT` slot that stores the repetition count.
    pub count_slot: String,
}

impl Repeatable {
    pub fn contains(&self, count: usize) -> bool {
        (self.lower..=self.upper).contains(&count)
    }
}

/// A user-facing field of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeField {
    pub name: String,
    pub values: Vec<FieldValue>,
    pub repeatable: Option<Repeatable>,
    pub decorators: Decorators,
}

impl TypeField {
    pub fn new(name: impl Into<String>) -> Self {
        TypeField {
            name: name.into(),
            values: Vec::new(),
            repeatable: None,
            decorators: Decorators::default(),
        }
    }

    /// Attach repetition bounds tied to the counter slot `count_slot`.
    pub fn make_repeatable(&mut self, lower: usize, upper: usize, count_slot: impl Into<String>) {
        self.repeatable = Some(Repeatable {
            lower,
            upper,
            count_slot: count_slot.into(),
        });
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable.is_some()
    }

    pub fn value_for_slot(&self, slot: &str) -> Option<&FieldValue> {
        self.values.iter().find(|v| v.slot == slot)
    }
}
