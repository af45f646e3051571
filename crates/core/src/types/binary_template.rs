//! Byte-layout schema of a resource type.
//!
//! A template is an ordered list of `(kind, label)` slots. Repeatable groups
//! are written as `OCNT "Count"; LSTC "Begin"; ...children...; LSTE "End";`
//! and parse into a single `OCNT` slot whose children are the group members.

use std::collections::HashSet;
use std::fmt;

use crate::config::Format;
use crate::diagnostic::{code, Diagnostic, ErrorKind, Result};
use crate::expectation::Expectation;
use crate::lexer::{Lexeme, LexemeKind};
use crate::stream::TokenStream;

use super::registry::TypeRegistry;

/// Closed set of binary slot kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    /// Signed integers of 1, 2, 4 and 8 bytes.
    Dbyt,
    Dwrd,
    Dlng,
    Dqad,
    /// Unsigned integers of 1, 2, 4 and 8 bytes.
    Hbyt,
    Hwrd,
    Hlng,
    Hqad,
    /// Length-prefixed string.
    Pstr,
    /// NUL-terminated string.
    Cstr,
    /// Fixed-width NUL-padded characters (`Cnnn`, width in hex).
    Chars(usize),
    /// Raw bytes.
    Hexd,
    /// Four signed 16-bit sides: top, left, bottom, right.
    Rect,
    /// One byte, 0 or 1.
    Bool,
    /// One bit; consecutive bits share bytes.
    Bbit,
    /// Resource reference.
    Rsrc,
    /// Repetition counter; owns the group's child slots.
    Ocnt,
    /// List start marker.
    Lstc,
    /// List end marker.
    Lste,
    /// Another type's template, inlined.
    Nested(String),
}

impl BinaryKind {
    /// Look up a kind by its template name. `Nested<T>` is handled by the
    /// template parser.
    pub fn from_name(name: &str) -> Option<BinaryKind> {
        let kind = match name {
            "DBYT" => BinaryKind::Dbyt,
            "DWRD" => BinaryKind::Dwrd,
            "DLNG" => BinaryKind::Dlng,
            "DQAD" => BinaryKind::Dqad,
            "HBYT" => BinaryKind::Hbyt,
            "HWRD" => BinaryKind::Hwrd,
            "HLNG" => BinaryKind::Hlng,
            "HQAD" => BinaryKind::Hqad,
            "PSTR" => BinaryKind::Pstr,
            "CSTR" => BinaryKind::Cstr,
            "HEXD" => BinaryKind::Hexd,
            "RECT" => BinaryKind::Rect,
            "BOOL" => BinaryKind::Bool,
            "BBIT" => BinaryKind::Bbit,
            "RSRC" => BinaryKind::Rsrc,
            "OCNT" => BinaryKind::Ocnt,
            "LSTC" => BinaryKind::Lstc,
            "LSTE" => BinaryKind::Lste,
            _ => return Self::chars_from_name(name),
        };
        Some(kind)
    }

    fn chars_from_name(name: &str) -> Option<BinaryKind> {
        let digits = name.strip_prefix('C')?;
        if digits.len() != 3 {
            return None;
        }
        let width = usize::from_str_radix(digits, 16).ok()?;
        (width > 0).then_some(BinaryKind::Chars(width))
    }

    /// Byte width of a slot, or `None` when it depends on the value.
    /// Bits report zero: their bytes are accounted per run.
    pub fn fixed_width(&self, format: Format) -> Option<usize> {
        match self {
            BinaryKind::Dbyt | BinaryKind::Hbyt | BinaryKind::Bool => Some(1),
            BinaryKind::Dwrd | BinaryKind::Hwrd | BinaryKind::Ocnt => Some(2),
            BinaryKind::Dlng | BinaryKind::Hlng => Some(4),
            BinaryKind::Dqad | BinaryKind::Hqad | BinaryKind::Rect => Some(8),
            BinaryKind::Chars(width) => Some(*width),
            BinaryKind::Rsrc if !format.has_extended_references() => Some(2),
            BinaryKind::Bbit | BinaryKind::Lstc | BinaryKind::Lste => Some(0),
            BinaryKind::Rsrc
            | BinaryKind::Pstr
            | BinaryKind::Cstr
            | BinaryKind::Hexd
            | BinaryKind::Nested(_) => None,
        }
    }

    /// Inclusive integer range for integer-valued slots.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            BinaryKind::Dbyt => (i8::MIN as i128, i8::MAX as i128),
            BinaryKind::Dwrd => (i16::MIN as i128, i16::MAX as i128),
            BinaryKind::Dlng => (i32::MIN as i128, i32::MAX as i128),
            BinaryKind::Dqad | BinaryKind::Hqad => (i64::MIN as i128, i64::MAX as i128),
            BinaryKind::Hbyt => (0, u8::MAX as i128),
            BinaryKind::Hwrd | BinaryKind::Ocnt => (0, u16::MAX as i128),
            BinaryKind::Hlng => (0, u32::MAX as i128),
            BinaryKind::Bool | BinaryKind::Bbit => (0, 1),
            _ => return None,
        };
        Some(range)
    }
}

impl fmt::Display for BinaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryKind::Dbyt => "DBYT",
            BinaryKind::Dwrd => "DWRD",
            BinaryKind::Dlng => "DLNG",
            BinaryKind::Dqad => "DQAD",
            BinaryKind::Hbyt => "HBYT",
            BinaryKind::Hwrd => "HWRD",
            BinaryKind::Hlng => "HLNG",
            BinaryKind::Hqad => "HQAD",
            BinaryKind::Pstr => "PSTR",
            BinaryKind::Cstr => "CSTR",
            BinaryKind::Chars(width) => return write!(f, "C{:03X}", width),
            BinaryKind::Hexd => "HEXD",
            BinaryKind::Rect => "RECT",
            BinaryKind::Bool => "BOOL",
            BinaryKind::Bbit => "BBIT",
            BinaryKind::Rsrc => "RSRC",
            BinaryKind::Ocnt => "OCNT",
            BinaryKind::Lstc => "LSTC",
            BinaryKind::Lste => "LSTE",
            BinaryKind::Nested(name) => return write!(f, "Nested<{}>", name),
        };
        f.write_str(name)
    }
}

/// One slot of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryField {
    pub label: String,
    pub kind: BinaryKind,
    /// Group members; only populated for [`BinaryKind::Ocnt`].
    pub children: Vec<BinaryField>,
}

impl BinaryField {
    pub fn new(label: impl Into<String>, kind: BinaryKind) -> Self {
        BinaryField {
            label: label.into(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == BinaryKind::Ocnt
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BinaryTemplate {
    fields: Vec<BinaryField>,
}

impl BinaryTemplate {
    /// Build a template from a flat slot list, folding OCNT/LSTC/LSTE runs
    /// into groups.
    pub fn from_flat(flat: Vec<BinaryField>) -> Result<BinaryTemplate> {
        let positioned = flat.into_iter().map(|f| (f, None)).collect();
        Self::assemble(positioned)
    }

    pub fn fields(&self) -> &[BinaryField] {
        &self.fields
    }

    /// Find a slot by label anywhere in the template, group members included.
    pub fn field_named(&self, label: &str) -> Option<&BinaryField> {
        fn find<'t>(fields: &'t [BinaryField], label: &str) -> Option<&'t BinaryField> {
            fields.iter().find_map(|f| {
                if f.label == label {
                    Some(f)
                } else {
                    find(&f.children, label)
                }
            })
        }
        find(&self.fields, label)
    }

    /// The counter slot whose group contains `label`.
    pub fn group_containing(&self, label: &str) -> Option<&BinaryField> {
        self.fields
            .iter()
            .find(|f| f.is_group() && f.children.iter().any(|c| c.label == label))
    }

    /// Labels of the top-level slots, in order.
    pub fn labels(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.label.clone()).collect()
    }

    /// Parse `template { KIND "Label"; ... }`. Nested types must already be
    /// registered in `types`.
    pub fn parse(stream: &mut TokenStream, types: &TypeRegistry) -> Result<BinaryTemplate> {
        stream.take_word("template")?;
        stream.take(LexemeKind::LBrace)?;
        let mut flat = Vec::new();
        while stream.accept_kind(LexemeKind::RBrace).is_none() {
            let kind_lexeme = stream.take(LexemeKind::Identifier)?;
            let kind = if kind_lexeme.text == "Nested" {
                Self::parse_nested_name(stream, &kind_lexeme, types)?
            } else {
                BinaryKind::from_name(&kind_lexeme.text).ok_or_else(|| {
                    Diagnostic::at(
                        ErrorKind::MalformedTemplate,
                        &kind_lexeme,
                        format!("unrecognized binary field type '{}'", kind_lexeme.text),
                    )
                    .with_code(code::UNRECOGNIZED_BINARY_TYPE)
                })?
            };
            let label = stream.take(LexemeKind::String)?;
            stream.take(LexemeKind::Semicolon)?;
            flat.push((BinaryField::new(label.text.clone(), kind), Some(kind_lexeme)));
        }
        Self::assemble(flat)
    }

    /// `Nested<TypeName>`, the `Nested` lexeme already consumed.
    fn parse_nested_name(
        stream: &mut TokenStream,
        nested: &Lexeme,
        types: &TypeRegistry,
    ) -> Result<BinaryKind> {
        let mark = stream.mark();
        let shape = [
            Expectation::kind(LexemeKind::LAngle),
            Expectation::kind(LexemeKind::Identifier),
            Expectation::kind(LexemeKind::RAngle),
        ];
        if !stream.expect(&shape) {
            stream.rewind(mark);
            return Err(Diagnostic::at(
                ErrorKind::MalformedTemplate,
                nested,
                "missing nested resource type name",
            )
            .with_code(code::MISSING_NESTED_TYPE)
            .with_info("expected Nested<TypeName>"));
        }
        let taken = stream.ensure(&shape)?;
        let name = &taken[1];
        if types.get(&name.text).is_none() {
            return Err(Diagnostic::at(
                ErrorKind::UnresolvedSymbol,
                name,
                format!("unrecognized type name '{}'", name.text),
            )
            .with_code(code::UNRECOGNIZED_TYPE)
            .with_info("nested types must be declared before the type that uses them"));
        }
        Ok(BinaryKind::Nested(name.text.clone()))
    }

    fn assemble(flat: Vec<(BinaryField, Option<Lexeme>)>) -> Result<BinaryTemplate> {
        let malformed = |reason: String, code: &str, at: &Option<Lexeme>| {
            let diag = Diagnostic::new(ErrorKind::MalformedTemplate, reason).with_code(code);
            match at {
                Some(lexeme) => diag.located(lexeme),
                None => diag,
            }
        };

        let mut seen = HashSet::new();
        for (field, at) in &flat {
            let marker = matches!(field.kind, BinaryKind::Lstc | BinaryKind::Lste);
            if !marker && !seen.insert(field.label.clone()) {
                let diag = Diagnostic::new(
                    ErrorKind::DuplicateDefinition,
                    format!("template label '{}' is used twice", field.label),
                );
                return Err(match at {
                    Some(lexeme) => diag.located(lexeme),
                    None => diag,
                });
            }
        }

        // Stack of open groups; the bottom entry collects top-level slots.
        let mut open: Vec<(BinaryField, Option<Lexeme>)> =
            vec![(BinaryField::new("", BinaryKind::Ocnt), None)];
        let mut slots = flat.into_iter().peekable();
        while let Some((field, at)) = slots.next() {
            match field.kind {
                BinaryKind::Ocnt => {
                    if open.len() > 1 {
                        return Err(malformed(
                            format!(
                                "OCNT field '{}' cannot open a list inside another list",
                                field.label
                            ),
                            code::LIST_BRACKETING,
                            &at,
                        ));
                    }
                    let followed_by_list = slots
                        .peek()
                        .is_some_and(|(next, _)| next.kind == BinaryKind::Lstc);
                    if !followed_by_list {
                        let next_at = slots.peek().and_then(|(_, a)| a.clone());
                        return Err(malformed(
                            format!(
                                "OCNT field '{}' must be followed by an LSTC field",
                                field.label
                            ),
                            code::COUNTER_WITHOUT_LIST,
                            if next_at.is_some() { &next_at } else { &at },
                        ));
                    }
                    slots.next();
                    open.push((field, at));
                }
                BinaryKind::Lstc => {
                    return Err(malformed(
                        format!("LSTC field '{}' must follow an OCNT field", field.label),
                        code::LIST_BRACKETING,
                        &at,
                    ));
                }
                BinaryKind::Lste => {
                    if open.len() == 1 {
                        return Err(malformed(
                            format!("LSTE field '{}' closes no open list", field.label),
                            code::LIST_BRACKETING,
                            &at,
                        ));
                    }
                    if let Some((group, _)) = open.pop() {
                        if let Some((parent, _)) = open.last_mut() {
                            parent.children.push(group);
                        }
                    }
                }
                _ => {
                    if let Some((parent, _)) = open.last_mut() {
                        parent.children.push(field);
                    }
                }
            }
        }

        if open.len() > 1 {
            let (group, at) = &open[open.len() - 1];
            return Err(malformed(
                format!("list started by OCNT field '{}' is never closed by LSTE", group.label),
                code::LIST_BRACKETING,
                at,
            ));
        }
        let fields = open.pop().map(|(root, _)| root.children).unwrap_or_default();
        Ok(BinaryTemplate { fields })
    }
}
