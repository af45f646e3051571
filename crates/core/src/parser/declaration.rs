use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::Parser;
use crate::diagnostic::{code, Diagnostic, ErrorKind, Result};
use crate::encoder::slot_key;
use crate::lexer::{Lexeme, LexemeKind};
use crate::project::ResourceContainer;
use crate::reference::ResourceReference;
use crate::types::{BinaryKind, Repeatable, TypeDefinition};
use crate::value::ValueContainer;

type Values = BTreeMap<String, ValueContainer>;

/// The `[Namespace.]Type` a declare block populates.
struct Declared {
    namespace: String,
    definition: TypeDefinition,
}

impl Declared {
    fn reference(&self, id: i64) -> ResourceReference {
        let reference = ResourceReference::typed(self.definition.name.clone(), id);
        if self.namespace.is_empty() {
            reference
        } else {
            reference.in_container(self.namespace.clone())
        }
    }
}

impl<'s, 'p> Parser<'s, 'p> {
    // -- Declarations -------------------------------------------

    /// `declare [Namespace.]Type { new ...; override ...; duplicate ...; };`
    pub(super) fn declaration(&mut self) -> Result<()> {
        self.stream.take_word("declare")?;
        let target = self.stream.take(LexemeKind::Identifier)?;
        let (namespace, type_name) = match target.text.rsplit_once('.') {
            Some((namespace, type_name)) => (namespace.to_owned(), type_name.to_owned()),
            None => (String::new(), target.text.clone()),
        };
        let definition = self
            .session
            .project
            .types
            .get(&type_name)
            .cloned()
            .ok_or_else(|| {
                Diagnostic::at(
                    ErrorKind::UnresolvedSymbol,
                    &target,
                    format!("unrecognized type name '{}'", type_name),
                )
                .with_code(code::UNRECOGNIZED_TYPE)
            })?;
        if let Some(deprecated) = definition.decorators.get("deprecated") {
            warn!(
                type_name = %definition.name,
                file = %target.file(),
                line = target.line,
                note = deprecated.arguments.first().map(String::as_str).unwrap_or_default(),
                "declaring resources of a deprecated type"
            );
        }
        let declared = Declared {
            namespace,
            definition,
        };

        self.stream.take(LexemeKind::LBrace)?;
        while self.stream.accept_kind(LexemeKind::RBrace).is_none() {
            let keyword = self.stream.take(LexemeKind::Identifier)?;
            match keyword.text.as_str() {
                "new" => self.new_resource(&declared, &keyword)?,
                "override" => self.override_resource(&declared, &keyword)?,
                "duplicate" => self.duplicate_resource(&declared, &keyword)?,
                _ => {
                    return Err(Diagnostic::unexpected(&keyword)
                        .with_info("expected 'new', 'override' or 'duplicate'"))
                }
            }
            self.end_item()?;
        }
        self.end_item()?;
        Ok(())
    }

    /// `new (#id | #auto [, "Name"]) { ... }`
    fn new_resource(&mut self, declared: &Declared, keyword: &Lexeme) -> Result<()> {
        self.stream.take(LexemeKind::LParen)?;
        let id_lexeme = self.stream.take(LexemeKind::Reference)?;
        let name = self.resource_name()?;
        self.stream.take(LexemeKind::RParen)?;

        let id = self.resource_id(declared, &id_lexeme)?;
        let values = self.declaration_body(declared, &Values::new(), keyword)?;
        let container = self.resource_container(declared, true, &id_lexeme)?;
        let instance = container
            .construct(declared.reference(id), &name)
            .map_err(|diag| diag.located(&id_lexeme))?;
        instance.values = values;
        Ok(())
    }

    /// `override (#id) { ... }`
    fn override_resource(&mut self, declared: &Declared, keyword: &Lexeme) -> Result<()> {
        self.stream.take(LexemeKind::LParen)?;
        let id_lexeme = self.stream.take(LexemeKind::Reference)?;
        self.stream.take(LexemeKind::RParen)?;

        let reference = declared.reference(reference_id(&id_lexeme)?);
        let base = self
            .existing(declared, reference.id)
            .map(|instance| instance.values.clone())
            .ok_or_else(|| missing(&id_lexeme, &reference))?;
        let values = self.declaration_body(declared, &base, keyword)?;
        let container = self.resource_container(declared, false, &id_lexeme)?;
        if let Some(instance) = container.instance_mut(reference.id) {
            instance.values = values;
        }
        debug!(resource = %reference, "overrode resource");
        Ok(())
    }

    /// `duplicate (#source as #target [, "Name"]) { ... }`
    fn duplicate_resource(&mut self, declared: &Declared, keyword: &Lexeme) -> Result<()> {
        self.stream.take(LexemeKind::LParen)?;
        let source_lexeme = self.stream.take(LexemeKind::Reference)?;
        self.stream.take_word("as")?;
        let target_lexeme = self.stream.take(LexemeKind::Reference)?;
        let name = self.resource_name()?;
        self.stream.take(LexemeKind::RParen)?;

        let source = declared.reference(reference_id(&source_lexeme)?);
        let mut copy = self
            .existing(declared, source.id)
            .cloned()
            .ok_or_else(|| missing(&source_lexeme, &source))?;
        let target = declared.reference(self.resource_id(declared, &target_lexeme)?);
        copy.values = self.declaration_body(declared, &copy.values, keyword)?;
        copy.reference = target.clone();
        copy.data.clear();
        if !name.is_empty() {
            copy.name = name;
        }
        self.resource_container(declared, true, &target_lexeme)?
            .insert(copy)
            .map_err(|diag| diag.located(&target_lexeme))?;
        debug!(%source, %target, "duplicated resource");
        Ok(())
    }

    /// Optional `, "Name"` after the id.
    fn resource_name(&mut self) -> Result<String> {
        if self.stream.accept_kind(LexemeKind::Comma).is_some() {
            Ok(self.stream.take(LexemeKind::String)?.text)
        } else {
            Ok(String::new())
        }
    }

    /// Explicit id, or the lowest free id from `first_auto_id` for `#auto`.
    fn resource_id(&mut self, declared: &Declared, lexeme: &Lexeme) -> Result<i64> {
        if lexeme.text != "auto" {
            return reference_id(lexeme);
        }
        let start = self.session.options.first_auto_id;
        let id = self
            .existing_container(declared)
            .map_or(Ok(start), |container| container.next_free_id(start))
            .map_err(|diag| diag.located(lexeme))?;
        debug!(id, "allocated resource id");
        Ok(id)
    }

    fn existing_container(&mut self, declared: &Declared) -> Option<&mut ResourceContainer> {
        let unit = self.session.unit.clone();
        self.session
            .project
            .unit(&unit, false)
            .and_then(|u| u.container(&declared.namespace, false))
            .and_then(|ns| ns.resource_container(declared.definition.code, false))
    }

    fn existing(&mut self, declared: &Declared, id: i64) -> Option<&crate::project::Instance> {
        self.existing_container(declared)
            .and_then(|container| container.instance(id))
    }

    /// The container for the declared type in the current unit and
    /// namespace, created on demand when `allow_creation` is set.
    fn resource_container(
        &mut self,
        declared: &Declared,
        allow_creation: bool,
        at: &Lexeme,
    ) -> Result<&mut ResourceContainer> {
        let unit = self.session.unit.clone();
        self.session
            .project
            .unit(&unit, allow_creation)
            .and_then(|u| u.container(&declared.namespace, allow_creation))
            .and_then(|ns| ns.resource_container(declared.definition.code, allow_creation))
            .ok_or_else(|| {
                Diagnostic::at(
                    ErrorKind::UnresolvedSymbol,
                    at,
                    format!(
                        "no '{}' resources exist in unit '{}'",
                        declared.definition.name, unit
                    ),
                )
            })
    }

    /// `{ Field = v, ...; Type(args); ... }` applied over `base`.
    ///
    /// Explicit assignments win over constructor results, which win over
    /// the values already in `base`.
    fn declaration_body(
        &mut self,
        declared: &Declared,
        base: &Values,
        keyword: &Lexeme,
    ) -> Result<Values> {
        let definition = &declared.definition;
        let mut explicit = Values::new();
        let mut constructed = Values::new();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();

        self.stream.take(LexemeKind::LBrace)?;
        while self.stream.accept_kind(LexemeKind::RBrace).is_none() {
            let name = self.stream.take(LexemeKind::Identifier)?;
            if self.stream.accept_kind(LexemeKind::LParen).is_some() {
                if name.text != definition.name {
                    return Err(Diagnostic::at(
                        ErrorKind::UnresolvedSymbol,
                        &name,
                        format!("unrecognized function '{}'", name.text),
                    )
                    .with_info(format!(
                        "only the '{}' constructor can be called here",
                        definition.name
                    )));
                }
                let lexemes = self.stream.read_until(LexemeKind::RParen)?;
                self.stream.take(LexemeKind::RParen)?;
                let arguments = self.arguments(&lexemes)?;
                constructed.extend(self.construct_values(definition, &name, arguments, "")?);
            } else {
                self.stream.take(LexemeKind::Equals)?;
                self.assign(definition, &name, base, &mut explicit, &mut counts)?;
            }
            self.stream.take(LexemeKind::Semicolon)?;
        }

        for field in &definition.fields {
            let Some(repeat) = &field.repeatable else {
                continue;
            };
            let count = repetitions(repeat, &counts, base);
            if count < repeat.lower {
                return Err(Diagnostic::at(
                    ErrorKind::InvalidValue,
                    keyword,
                    format!(
                        "field '{}' needs at least {} repetition(s), found {}",
                        field.name, repeat.lower, count
                    ),
                )
                .with_code(code::ILLEGAL_VALUE));
            }
        }

        let mut values = base.clone();
        values.extend(constructed);
        values.extend(explicit);
        Ok(values)
    }

    /// `Field = v1, v2, ...` (the `=` already consumed). A repeatable field
    /// appends one repetition.
    fn assign(
        &mut self,
        definition: &TypeDefinition,
        name: &Lexeme,
        base: &Values,
        explicit: &mut Values,
        counts: &mut BTreeMap<String, usize>,
    ) -> Result<()> {
        let field = definition.field_named(&name.text).ok_or_else(|| {
            Diagnostic::at(
                ErrorKind::UnresolvedSymbol,
                name,
                format!("type '{}' has no field named '{}'", definition.name, name.text),
            )
            .with_code(code::UNKNOWN_FIELD)
        })?;

        let index = match &field.repeatable {
            Some(repeat) => {
                let current = repetitions(repeat, counts, base);
                if current >= repeat.upper {
                    return Err(Diagnostic::at(
                        ErrorKind::InvalidValue,
                        name,
                        format!("field '{}' repeats at most {} time(s)", field.name, repeat.upper),
                    )
                    .with_code(code::ILLEGAL_VALUE));
                }
                counts.insert(repeat.count_slot.clone(), current + 1);
                explicit.insert(
                    repeat.count_slot.clone(),
                    ValueContainer::Integer((current + 1) as i64),
                );
                Some(current)
            }
            None => None,
        };

        let mut slots = field.values.iter();
        loop {
            let lexemes = self.value_lexemes(&[LexemeKind::Comma, LexemeKind::Semicolon], false)?;
            let Some(slot) = slots.next() else {
                return Err(Diagnostic::at(
                    ErrorKind::InvalidValue,
                    &lexemes[0],
                    format!(
                        "field '{}' takes {} value(s)",
                        field.name,
                        field.values.len()
                    ),
                )
                .with_code(code::ILLEGAL_VALUE));
            };
            let key = slot_key("", &slot.slot, index);
            match &slot.kind {
                BinaryKind::Nested(type_name) => {
                    let nested = self.nested_values(type_name, &lexemes, &key)?;
                    explicit.extend(nested);
                }
                kind => {
                    let value = self.convert(&lexemes, kind, &slot.symbols)?;
                    explicit.insert(key, value);
                }
            }
            if self.stream.accept_kind(LexemeKind::Comma).is_none() {
                break;
            }
        }
        Ok(())
    }

    /// `T(args)` for a `Nested<T>` slot: runs `T`'s constructor and stores
    /// its results under `key.Label`.
    fn nested_values(
        &mut self,
        type_name: &str,
        lexemes: &[Lexeme],
        key: &str,
    ) -> Result<Vec<(String, ValueContainer)>> {
        let call = &lexemes[0];
        let well_formed = lexemes.len() >= 3
            && call.is_word(type_name)
            && lexemes[1].is(LexemeKind::LParen)
            && lexemes[lexemes.len() - 1].is(LexemeKind::RParen);
        if !well_formed {
            return Err(Diagnostic::at(
                ErrorKind::InvalidValue,
                call,
                format!("'{}' is a Nested<{}> slot", key, type_name),
            )
            .with_code(code::ILLEGAL_VALUE)
            .with_info(format!("assign it with a constructor call such as {}(...)", type_name)));
        }
        let nested = self
            .session
            .project
            .types
            .get(type_name)
            .cloned()
            .ok_or_else(|| {
                Diagnostic::at(
                    ErrorKind::UnresolvedSymbol,
                    call,
                    format!("unrecognized type name '{}'", type_name),
                )
                .with_code(code::UNRECOGNIZED_TYPE)
            })?;
        let arguments = self.arguments(&lexemes[2..lexemes.len() - 1])?;
        self.construct_values(&nested, call, arguments, &format!("{}.", key))
    }
}

/// Repetitions recorded so far for `repeat`'s counter slot.
fn repetitions(repeat: &Repeatable, counts: &BTreeMap<String, usize>, base: &Values) -> usize {
    counts
        .get(&repeat.count_slot)
        .copied()
        .or_else(|| {
            base.get(&repeat.count_slot)
                .and_then(ValueContainer::as_integer)
                .and_then(|n| usize::try_from(n).ok())
        })
        .unwrap_or(0)
}

fn reference_id(lexeme: &Lexeme) -> Result<i64> {
    ResourceReference::parse(&lexeme.text)
        .map(|reference| reference.id)
        .ok_or_else(|| {
            Diagnostic::at(
                ErrorKind::InvalidValue,
                lexeme,
                format!("'#{}' is not a valid resource id", lexeme.text),
            )
            .with_code(code::BAD_VALUE)
        })
}

fn missing(lexeme: &Lexeme, reference: &ResourceReference) -> Diagnostic {
    Diagnostic::at(
        ErrorKind::UnresolvedSymbol,
        lexeme,
        format!("resource {} does not exist", reference),
    )
}
