use super::Parser;
use crate::diagnostic::{code, Diagnostic, ErrorKind, Result};
use crate::expectation::Expectation;
use crate::interpreter::Script;
use crate::lexer::{Lexeme, LexemeKind};
use crate::types::{
    BinaryKind, BinaryTemplate, Decorators, FieldValue, SymbolList, TypeCode, TypeConstructor,
    TypeDefinition, TypeField,
};

impl<'s, 'p> Parser<'s, 'p> {
    // -- Type definitions ---------------------------------------

    /// `type Name : "CODE" { template {...}; field(...)...; constructor(...) {...}; };`
    pub(super) fn type_definition(&mut self, decorators: Decorators) -> Result<()> {
        let keyword = self.stream.take_word("type")?;
        let name = self.stream.take(LexemeKind::Identifier)?;
        self.stream.take(LexemeKind::Colon)?;
        let code_lexeme = self.stream.take(LexemeKind::String)?;
        let code = TypeCode::parse(&code_lexeme.text).ok_or_else(|| {
            Diagnostic::at(
                ErrorKind::InvalidValue,
                &code_lexeme,
                format!("type code '{}' must be exactly four characters", code_lexeme.text),
            )
            .with_code(code::BAD_VALUE)
        })?;

        let mut definition = TypeDefinition::new(name.text.clone(), code);
        definition.decorators = decorators;

        self.stream.take(LexemeKind::LBrace)?;
        definition.template = BinaryTemplate::parse(&mut self.stream, &self.session.project.types)?;
        self.end_item()?;

        while self.stream.accept_kind(LexemeKind::RBrace).is_none() {
            let decorators = self.decorators()?;
            let member = self.stream.peek(0).clone();
            if member.is_word("field") {
                let mut field = self.field(&definition)?;
                field.decorators = decorators;
                definition
                    .add_field(field)
                    .map_err(|diag| diag.located(&member))?;
            } else if member.is_word("constructor") {
                let mut constructor = self.constructor()?;
                constructor.decorators = decorators;
                definition
                    .add_constructor(constructor)
                    .map_err(|diag| diag.located(&member))?;
            } else {
                return Err(Diagnostic::unexpected(&member)
                    .with_info("expected 'field' or 'constructor' in a type definition"));
            }
        }
        self.end_item()?;

        self.session
            .project
            .types
            .register(definition)
            .map_err(|diag| diag.located(&keyword))?;
        Ok(())
    }

    /// `field("Name") [repeatable<...>] [{ values }];`
    fn field(&mut self, definition: &TypeDefinition) -> Result<TypeField> {
        self.stream.take_word("field")?;
        let mut header = self.stream.ensure(&[
            Expectation::kind(LexemeKind::LParen),
            Expectation::kind(LexemeKind::String).on_failure(field_name_expected),
            Expectation::kind(LexemeKind::RParen),
        ])?;
        let name = header.swap_remove(1);
        let mut field = TypeField::new(name.text.clone());

        let bounds = match self.stream.accept(Expectation::kind_with(
            LexemeKind::Identifier,
            &["repeatable"],
        )) {
            Some(keyword) => Some((keyword, self.repeat_bounds()?)),
            None => None,
        };

        if self.stream.accept_kind(LexemeKind::LBrace).is_some() {
            while self.stream.accept_kind(LexemeKind::RBrace).is_none() {
                let value = self.field_value(definition)?;
                field.values.push(value);
            }
        } else {
            let kind = slot_kind(definition, &name)?;
            field.values.push(FieldValue::new(name.text.clone(), kind));
        }
        self.end_item()?;

        if let Some((keyword, bounds)) = bounds {
            make_repeatable(definition, &mut field, &keyword, bounds)?;
        } else if let Some(group) = field
            .values
            .iter()
            .find_map(|v| definition.template.group_containing(&v.slot))
        {
            return Err(Diagnostic::at(
                ErrorKind::MalformedTemplate,
                &name,
                format!(
                    "field '{}' binds a member of the '{}' list but is not repeatable",
                    field.name, group.label
                ),
            )
            .with_code(code::UNKNOWN_FIELD));
        }
        Ok(field)
    }

    /// `<upper>`, `<lower, upper>`, `<lower, upper, CountLabel>` or
    /// `<CountLabel>`.
    fn repeat_bounds(&mut self) -> Result<RepeatBounds> {
        self.stream.take(LexemeKind::LAngle)?;
        if let Some(count) = self.stream.accept_kind(LexemeKind::Identifier) {
            self.stream.take(LexemeKind::RAngle)?;
            return Ok(RepeatBounds {
                lower: 1,
                upper: None,
                count: Some(count),
            });
        }
        let first = self.bound()?;
        let mut bounds = RepeatBounds {
            lower: 0,
            upper: Some(first),
            count: None,
        };
        if self.stream.accept_kind(LexemeKind::Comma).is_some() {
            bounds.lower = first;
            bounds.upper = Some(self.bound()?);
            if self.stream.accept_kind(LexemeKind::Comma).is_some() {
                bounds.count = Some(self.stream.take(LexemeKind::Identifier)?);
            }
        }
        self.stream.take(LexemeKind::RAngle)?;
        Ok(bounds)
    }

    /// A non-negative integer literal or `$variable`.
    fn bound(&mut self) -> Result<usize> {
        let lexeme = self.stream.read();
        let value = match lexeme.kind {
            LexemeKind::Integer => Some(lexeme.integer()?),
            LexemeKind::Variable if !lexeme.text.is_empty() => {
                let root = self.session.scopes.root();
                self.session
                    .scopes
                    .variable(root, &lexeme.text)
                    .and_then(|t| t.as_integer())
            }
            _ => return Err(Diagnostic::unexpected(&lexeme).with_info("expected a repeat bound")),
        };
        value
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                Diagnostic::at(
                    ErrorKind::InvalidValue,
                    &lexeme,
                    "repeat bounds must be non-negative integers",
                )
                .with_code(code::BAD_VALUE)
            })
    }

    /// `Label [as KIND | as Nested<T>] [= default] [[Sym = literal, ...]];`
    fn field_value(&mut self, definition: &TypeDefinition) -> Result<FieldValue> {
        let label = self.stream.take(LexemeKind::Identifier)?;
        let kind = slot_kind(definition, &label)?;

        if self.stream.accept(Expectation::kind_with(
            LexemeKind::Identifier,
            &["as"],
        ))
        .is_some()
        {
            let declared = self.stream.take(LexemeKind::Identifier)?;
            let declared_kind = if declared.text == "Nested" {
                self.stream.take(LexemeKind::LAngle)?;
                let nested = self.stream.take(LexemeKind::Identifier)?;
                self.stream.take(LexemeKind::RAngle)?;
                Some(BinaryKind::Nested(nested.text))
            } else {
                BinaryKind::from_name(&declared.text)
            };
            if declared_kind.as_ref() != Some(&kind) {
                return Err(Diagnostic::at(
                    ErrorKind::MalformedTemplate,
                    &declared,
                    format!(
                        "'{}' is declared as {} but its template slot is {}",
                        label.text, declared.text, kind
                    ),
                )
                .with_code(code::UNRECOGNIZED_BINARY_TYPE));
            }
        }

        let mut value = FieldValue::new(label.text.clone(), kind);
        let default = if self.stream.accept_kind(LexemeKind::Equals).is_some() {
            Some(self.value_lexemes(&[LexemeKind::Semicolon], true)?)
        } else {
            None
        };

        if self.stream.accept_kind(LexemeKind::LBracket).is_some() {
            value.symbols = self.symbol_list(&value.kind)?;
        }
        if let Some(lexemes) = default {
            let converted = self.convert(&lexemes, &value.kind, &value.symbols)?;
            value.default = Some(converted);
        }
        self.stream.take(LexemeKind::Semicolon)?;
        Ok(value)
    }

    /// `Sym = literal, ... ]`, the opening bracket already consumed.
    fn symbol_list(&mut self, kind: &BinaryKind) -> Result<SymbolList> {
        let mut symbols = SymbolList::default();
        while self.stream.accept_kind(LexemeKind::RBracket).is_none() {
            let name = self.stream.take(LexemeKind::Identifier)?;
            self.stream.take(LexemeKind::Equals)?;
            let lexemes = self.value_lexemes(&[LexemeKind::Comma, LexemeKind::RBracket], false)?;
            let value = self.convert(&lexemes, kind, &SymbolList::default())?;
            if !symbols.insert(name.text.clone(), value) {
                return Err(Diagnostic::at(
                    ErrorKind::DuplicateDefinition,
                    &name,
                    format!("symbol '{}' is declared twice", name.text),
                ));
            }
            if self
                .stream
                .expect(&[Expectation::kind(LexemeKind::RBracket).be(false)])
            {
                self.stream.take(LexemeKind::Comma)?;
            }
        }
        Ok(symbols)
    }

    /// `constructor(a, b) { statements };`
    fn constructor(&mut self) -> Result<TypeConstructor> {
        self.stream.take_word("constructor")?;
        self.stream.take(LexemeKind::LParen)?;
        let mut parameters = Vec::new();
        if self.stream.accept_kind(LexemeKind::RParen).is_none() {
            loop {
                parameters.push(self.stream.take(LexemeKind::Identifier)?.text);
                if self.stream.accept_kind(LexemeKind::Comma).is_none() {
                    self.stream.take(LexemeKind::RParen)?;
                    break;
                }
            }
        }
        let script = Script::parse(&mut self.stream)?;
        self.end_item()?;
        Ok(TypeConstructor::new(parameters, script))
    }
}

/// Parsed `repeatable<...>` clause.
struct RepeatBounds {
    lower: usize,
    upper: Option<usize>,
    count: Option<Lexeme>,
}

fn field_name_expected(lexeme: &Lexeme) -> Diagnostic {
    Diagnostic::unexpected(lexeme).with_info("field names are quoted, as in field(\"Name\")")
}

/// Kind of the template slot `label`, group members included.
fn slot_kind(definition: &TypeDefinition, label: &Lexeme) -> Result<BinaryKind> {
    match definition.template.field_named(&label.text) {
        Some(slot) if !matches!(slot.kind, BinaryKind::Lstc | BinaryKind::Lste) => {
            Ok(slot.kind.clone())
        }
        _ => Err(Diagnostic::at(
            ErrorKind::UnresolvedSymbol,
            label,
            format!(
                "type '{}' has no template slot named '{}'",
                definition.name, label.text
            ),
        )
        .with_code(code::UNKNOWN_FIELD)),
    }
}

fn make_repeatable(
    definition: &TypeDefinition,
    field: &mut TypeField,
    keyword: &Lexeme,
    bounds: RepeatBounds,
) -> Result<()> {
    let malformed = |reason: String| {
        Diagnostic::at(ErrorKind::MalformedTemplate, keyword, reason).with_code(code::UNKNOWN_FIELD)
    };
    let counter = match &bounds.count {
        Some(label) => definition
            .template
            .fields()
            .iter()
            .find(|f| f.label == label.text && f.is_group())
            .ok_or_else(|| {
                Diagnostic::at(
                    ErrorKind::UnresolvedSymbol,
                    label,
                    format!("'{}' is not an OCNT slot of the template", label.text),
                )
                .with_code(code::UNKNOWN_FIELD)
            })?,
        None => field
            .values
            .first()
            .and_then(|v| definition.template.group_containing(&v.slot))
            .ok_or_else(|| {
                malformed(format!(
                    "repeatable field '{}' binds no member of an OCNT list",
                    field.name
                ))
            })?,
    };
    if let Some(stray) = field
        .values
        .iter()
        .find(|v| !counter.children.iter().any(|c| c.label == v.slot))
    {
        return Err(malformed(format!(
            "slot '{}' of repeatable field '{}' is not a member of the '{}' list",
            stray.slot, field.name, counter.label
        )));
    }
    let upper = bounds.upper.unwrap_or(usize::from(u16::MAX));
    if bounds.lower > upper {
        return Err(Diagnostic::at(
            ErrorKind::InvalidValue,
            keyword,
            format!("repeat bounds <{}, {}> are inverted", bounds.lower, upper),
        )
        .with_code(code::BAD_VALUE));
    }
    field.make_repeatable(bounds.lower, upper, counter.label.clone());
    Ok(())
}
