//! Binary encoder.
//!
//! Walks a type's template against an instance's resolved values and emits
//! the big-endian payload. Missing values fall back to the slot's declared
//! default and then to zero. Encoding is a pure function of the template,
//! the values and the target format.

use std::collections::BTreeMap;

use crate::config::Format;
use crate::diagnostic::{code, Diagnostic, ErrorKind, Result};
use crate::reference::ResourceReference;
use crate::types::{BinaryField, BinaryKind, TypeDefinition, TypeRegistry};
use crate::value::{Rect, ValueContainer};

/// Key under which a slot's value is stored on an instance.
///
/// `prefix` is empty at the top level and `Outer.` inside nested templates;
/// group members carry their repetition index (`Item[2]`).
pub fn slot_key(prefix: &str, label: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{}{}[{}]", prefix, label, i),
        None => format!("{}{}", prefix, label),
    }
}

/// Byte sink that packs consecutive bits MSB-first.
#[derive(Debug, Default)]
struct ByteWriter {
    bytes: Vec<u8>,
    bits: u8,
    bit_count: u8,
}

impl ByteWriter {
    fn put(&mut self, data: &[u8]) {
        self.align();
        self.bytes.extend_from_slice(data);
    }

    fn put_bit(&mut self, set: bool) {
        if set {
            self.bits |= 0x80 >> self.bit_count;
        }
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.align();
        }
    }

    /// Flush a partially filled bit byte.
    fn align(&mut self) {
        if self.bit_count > 0 {
            self.bytes.push(self.bits);
            self.bits = 0;
            self.bit_count = 0;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.align();
        self.bytes
    }
}

pub struct Encoder<'a> {
    types: &'a TypeRegistry,
    format: Format,
}

impl<'a> Encoder<'a> {
    pub fn new(types: &'a TypeRegistry, format: Format) -> Self {
        Encoder { types, format }
    }

    /// Encode `values` against `definition`'s template.
    pub fn encode(
        &self,
        definition: &TypeDefinition,
        values: &BTreeMap<String, ValueContainer>,
    ) -> Result<Vec<u8>> {
        let mut out = ByteWriter::default();
        self.encode_fields(
            definition,
            definition.template.fields(),
            "",
            None,
            values,
            &mut out,
        )?;
        Ok(out.finish())
    }

    fn encode_fields(
        &self,
        definition: &TypeDefinition,
        fields: &[BinaryField],
        prefix: &str,
        index: Option<usize>,
        values: &BTreeMap<String, ValueContainer>,
        out: &mut ByteWriter,
    ) -> Result<()> {
        for field in fields {
            let key = slot_key(prefix, &field.label, index);
            match &field.kind {
                BinaryKind::Ocnt => {
                    let count = self.resolve(definition, field, &key, values)?;
                    let count = count.as_integer().unwrap_or(0);
                    let count = u16::try_from(count).map_err(|_| {
                        invalid(&key, format!("repeat count {} does not fit OCNT", count))
                    })?;
                    out.put(&count.to_be_bytes());
                    for i in 0..usize::from(count) {
                        self.encode_fields(
                            definition,
                            &field.children,
                            prefix,
                            Some(i),
                            values,
                            out,
                        )?;
                        out.align();
                    }
                }
                BinaryKind::Nested(name) => {
                    let nested = self.types.get(name).ok_or_else(|| unknown_type(name))?;
                    let nested_prefix = format!("{}.", key);
                    self.encode_fields(
                        nested,
                        nested.template.fields(),
                        &nested_prefix,
                        None,
                        values,
                        out,
                    )?;
                    out.align();
                }
                BinaryKind::Lstc | BinaryKind::Lste => {}
                kind => {
                    let value = self.resolve(definition, field, &key, values)?;
                    self.encode_value(kind, &key, &value, out)?;
                }
            }
        }
        Ok(())
    }

    /// Explicit value, then declared default, then nil.
    fn resolve(
        &self,
        definition: &TypeDefinition,
        field: &BinaryField,
        key: &str,
        values: &BTreeMap<String, ValueContainer>,
    ) -> Result<ValueContainer> {
        let value = values
            .get(key)
            .or_else(|| definition.default_for(&field.label))
            .cloned()
            .unwrap_or(ValueContainer::Nil);
        value.check_fits(&field.kind).map_err(|reason| invalid(key, reason))?;
        Ok(value)
    }

    fn encode_value(
        &self,
        kind: &BinaryKind,
        key: &str,
        value: &ValueContainer,
        out: &mut ByteWriter,
    ) -> Result<()> {
        let integer = value.as_integer().unwrap_or(0);
        match kind {
            BinaryKind::Dbyt => out.put(&(integer as i8).to_be_bytes()),
            BinaryKind::Dwrd => out.put(&(integer as i16).to_be_bytes()),
            BinaryKind::Dlng => out.put(&(integer as i32).to_be_bytes()),
            BinaryKind::Dqad => out.put(&integer.to_be_bytes()),
            BinaryKind::Hbyt | BinaryKind::Bool => out.put(&(integer as u8).to_be_bytes()),
            BinaryKind::Hwrd => out.put(&(integer as u16).to_be_bytes()),
            BinaryKind::Hlng => out.put(&(integer as u32).to_be_bytes()),
            BinaryKind::Hqad => out.put(&(integer as u64).to_be_bytes()),
            BinaryKind::Bbit => out.put_bit(integer != 0),
            BinaryKind::Pstr => {
                let text = string_of(value);
                out.put(&[text.len() as u8]);
                out.put(text.as_bytes());
            }
            BinaryKind::Cstr => {
                out.put(string_of(value).as_bytes());
                out.put(&[0]);
            }
            BinaryKind::Chars(width) => {
                let mut block = vec![0u8; *width];
                let text = string_of(value).as_bytes();
                block[..text.len()].copy_from_slice(text);
                out.put(&block);
            }
            BinaryKind::Hexd => {
                if let ValueContainer::Data(bytes) = value {
                    out.put(bytes);
                }
            }
            BinaryKind::Rect => {
                let rect = match value {
                    ValueContainer::Rect(rect) => *rect,
                    _ => Rect {
                        top: 0,
                        left: 0,
                        bottom: 0,
                        right: 0,
                    },
                };
                for side in [rect.top, rect.left, rect.bottom, rect.right] {
                    out.put(&side.to_be_bytes());
                }
            }
            BinaryKind::Rsrc => {
                let reference = match value {
                    ValueContainer::Reference(r) => r.clone(),
                    _ => ResourceReference::new(0),
                };
                self.encode_reference(key, &reference, out)?;
            }
            BinaryKind::Ocnt | BinaryKind::Lstc | BinaryKind::Lste | BinaryKind::Nested(_) => {}
        }
        Ok(())
    }

    fn encode_reference(
        &self,
        key: &str,
        reference: &ResourceReference,
        out: &mut ByteWriter,
    ) -> Result<()> {
        if !self.format.has_extended_references() {
            let id = i16::try_from(reference.id).map_err(|_| {
                invalid(
                    key,
                    format!("reference id {} needs the extended format", reference.id),
                )
            })?;
            out.put(&id.to_be_bytes());
            return Ok(());
        }

        let mut flags = 0u8;
        let container = reference.container.as_deref().unwrap_or_default();
        if reference.container.is_some() {
            flags |= 0x01;
        }
        let code = match &reference.type_name {
            Some(name) => {
                flags |= 0x02;
                self.types.get(name).ok_or_else(|| unknown_type(name))?.code.bytes()
            }
            None => [0; 4],
        };
        out.put(&[flags, container.len() as u8]);
        out.put(container.as_bytes());
        out.put(&code);
        out.put(&reference.id.to_be_bytes());
        Ok(())
    }
}

fn string_of(value: &ValueContainer) -> &str {
    match value {
        ValueContainer::String(s) => s,
        _ => "",
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::InvalidValue,
        format!("cannot encode '{}': {}", key, reason.into()),
    )
}

fn unknown_type(name: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::UnresolvedSymbol,
        format!("unrecognized type name '{}'", name),
    )
    .with_code(code::UNRECOGNIZED_TYPE)
}
