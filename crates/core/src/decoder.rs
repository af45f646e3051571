//! Inverse of [`crate::encoder`]: recovers slot values from a payload.

use std::collections::BTreeMap;

use crate::config::Format;
use crate::diagnostic::{Diagnostic, ErrorKind, Result};
use crate::encoder::slot_key;
use crate::reference::ResourceReference;
use crate::types::{BinaryField, BinaryKind, TypeCode, TypeDefinition, TypeRegistry};
use crate::value::{Rect, ValueContainer};

struct ByteReader<'b> {
    bytes: &'b [u8],
    pos: usize,
    bits: u8,
    bit_count: u8,
}

impl<'b> ByteReader<'b> {
    fn new(bytes: &'b [u8]) -> Self {
        ByteReader {
            bytes,
            pos: 0,
            bits: 0,
            bit_count: 0,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'b [u8]> {
        self.align();
        let end = self.pos + len;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            Diagnostic::new(
                ErrorKind::InvalidValue,
                format!("payload ends after {} bytes, needed {}", self.bytes.len(), end),
            )
        })?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn bit(&mut self) -> Result<bool> {
        if self.bit_count == 0 {
            self.bits = self.array::<1>()?[0];
            self.bit_count = 8;
        }
        let set = self.bits & 0x80 != 0;
        self.bits <<= 1;
        self.bit_count -= 1;
        Ok(set)
    }

    /// Drop the rest of a partially read bit byte.
    fn align(&mut self) {
        self.bit_count = 0;
    }

    fn rest(&mut self) -> &'b [u8] {
        self.align();
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

pub struct Decoder<'a> {
    types: &'a TypeRegistry,
    format: Format,
}

impl<'a> Decoder<'a> {
    pub fn new(types: &'a TypeRegistry, format: Format) -> Self {
        Decoder { types, format }
    }

    /// Decode `bytes` as an instance of `definition`. Every slot appears in
    /// the result, keyed the way the encoder looks values up.
    pub fn decode(
        &self,
        definition: &TypeDefinition,
        bytes: &[u8],
    ) -> Result<BTreeMap<String, ValueContainer>> {
        let mut values = BTreeMap::new();
        let mut input = ByteReader::new(bytes);
        self.decode_fields(definition.template.fields(), "", None, true, &mut input, &mut values)?;
        if input.remaining() > 0 {
            return Err(Diagnostic::new(
                ErrorKind::InvalidValue,
                format!(
                    "{} trailing byte(s) after a '{}' payload",
                    input.remaining(),
                    definition.name
                ),
            ));
        }
        Ok(values)
    }

    fn decode_fields(
        &self,
        fields: &[BinaryField],
        prefix: &str,
        index: Option<usize>,
        tail: bool,
        input: &mut ByteReader<'_>,
        values: &mut BTreeMap<String, ValueContainer>,
    ) -> Result<()> {
        for (i, field) in fields.iter().enumerate() {
            let key = slot_key(prefix, &field.label, index);
            let last = tail && i + 1 == fields.len();
            match &field.kind {
                BinaryKind::Ocnt => {
                    let count = u16::from_be_bytes(input.array()?);
                    values.insert(key, ValueContainer::Integer(i64::from(count)));
                    for rep in 0..usize::from(count) {
                        self.decode_fields(
                            &field.children,
                            prefix,
                            Some(rep),
                            false,
                            input,
                            values,
                        )?;
                        input.align();
                    }
                }
                BinaryKind::Nested(name) => {
                    let nested = self.types.get(name).ok_or_else(|| {
                        Diagnostic::new(
                            ErrorKind::UnresolvedSymbol,
                            format!("unrecognized type name '{}'", name),
                        )
                    })?;
                    let nested_prefix = format!("{}.", key);
                    self.decode_fields(
                        nested.template.fields(),
                        &nested_prefix,
                        None,
                        last,
                        input,
                        values,
                    )?;
                    input.align();
                }
                BinaryKind::Lstc | BinaryKind::Lste => {}
                BinaryKind::Hexd if !last => {
                    return Err(Diagnostic::new(
                        ErrorKind::InvalidValue,
                        format!("HEXD slot '{}' can only be decoded as the final slot", key),
                    ));
                }
                kind => {
                    let value = self.decode_value(kind, input)?;
                    values.insert(key, value);
                }
            }
        }
        Ok(())
    }

    fn decode_value(
        &self,
        kind: &BinaryKind,
        input: &mut ByteReader<'_>,
    ) -> Result<ValueContainer> {
        let integer = |n: i64| Ok(ValueContainer::Integer(n));
        match kind {
            BinaryKind::Dbyt => integer(i8::from_be_bytes(input.array()?).into()),
            BinaryKind::Dwrd => integer(i16::from_be_bytes(input.array()?).into()),
            BinaryKind::Dlng => integer(i32::from_be_bytes(input.array()?).into()),
            BinaryKind::Dqad => integer(i64::from_be_bytes(input.array()?)),
            BinaryKind::Hbyt | BinaryKind::Bool => {
                integer(u8::from_be_bytes(input.array()?).into())
            }
            BinaryKind::Hwrd => integer(u16::from_be_bytes(input.array()?).into()),
            BinaryKind::Hlng => integer(u32::from_be_bytes(input.array()?).into()),
            BinaryKind::Hqad => integer(u64::from_be_bytes(input.array()?) as i64),
            BinaryKind::Bbit => integer(i64::from(input.bit()?)),
            BinaryKind::Pstr => {
                let len = input.array::<1>()?[0];
                text(input.take(usize::from(len))?)
            }
            BinaryKind::Cstr => {
                let mut bytes = Vec::new();
                loop {
                    match input.array::<1>()?[0] {
                        0 => break,
                        b => bytes.push(b),
                    }
                }
                text(&bytes)
            }
            BinaryKind::Chars(width) => {
                let block = input.take(*width)?;
                let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
                text(&block[..end])
            }
            BinaryKind::Hexd => Ok(ValueContainer::Data(input.rest().to_vec())),
            BinaryKind::Rect => {
                let mut side = || -> Result<i16> { Ok(i16::from_be_bytes(input.array()?)) };
                Ok(ValueContainer::Rect(Rect {
                    top: side()?,
                    left: side()?,
                    bottom: side()?,
                    right: side()?,
                }))
            }
            BinaryKind::Rsrc => self.decode_reference(input).map(ValueContainer::Reference),
            BinaryKind::Ocnt | BinaryKind::Lstc | BinaryKind::Lste | BinaryKind::Nested(_) => {
                Ok(ValueContainer::Nil)
            }
        }
    }

    fn decode_reference(&self, input: &mut ByteReader<'_>) -> Result<ResourceReference> {
        if !self.format.has_extended_references() {
            let id = i16::from_be_bytes(input.array()?);
            return Ok(ResourceReference::new(id.into()));
        }
        let [flags, len] = input.array::<2>()?;
        let container = String::from_utf8_lossy(input.take(usize::from(len))?).into_owned();
        let code = TypeCode::new(input.array()?);
        let id = i64::from_be_bytes(input.array()?);

        let mut reference = ResourceReference::new(id);
        if flags & 0x01 != 0 {
            reference.container = Some(container);
        }
        if flags & 0x02 != 0 {
            let definition = self.types.by_code(code).ok_or_else(|| {
                Diagnostic::new(
                    ErrorKind::UnresolvedSymbol,
                    format!("no type is registered for code '{}'", code),
                )
            })?;
            reference.type_name = Some(definition.name.clone());
        }
        Ok(reference)
    }
}

fn text(bytes: &[u8]) -> Result<ValueContainer> {
    String::from_utf8(bytes.to_vec())
        .map(ValueContainer::String)
        .map_err(|_| Diagnostic::new(ErrorKind::InvalidValue, "string slot is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use crate::types::BinaryTemplate;

    fn register(
        types: &mut TypeRegistry,
        name: &str,
        code: &str,
        fields: Vec<BinaryField>,
    ) -> TypeDefinition {
        let mut def = TypeDefinition::new(name, TypeCode::parse(code).unwrap());
        def.template = BinaryTemplate::from_flat(fields).unwrap();
        types.register(def.clone()).unwrap();
        def
    }

    fn round_trip(
        types: &TypeRegistry,
        def: &TypeDefinition,
        format: Format,
        values: BTreeMap<String, ValueContainer>,
    ) {
        let bytes = Encoder::new(types, format).encode(def, &values).unwrap();
        let decoded = Decoder::new(types, format).decode(def, &bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn mixed_template_round_trips() {
        let mut types = TypeRegistry::new();
        register(
            &mut types,
            "Point",
            "pnt ",
            vec![
                BinaryField::new("X", BinaryKind::Dwrd),
                BinaryField::new("Y", BinaryKind::Dwrd),
            ],
        );
        register(&mut types, "Sound", "snd ", vec![]);
        let def = register(
            &mut types,
            "Sprite",
            "spr ",
            vec![
                BinaryField::new("Id", BinaryKind::Dlng),
                BinaryField::new("Mask", BinaryKind::Hqad),
                BinaryField::new("Name", BinaryKind::Pstr),
                BinaryField::new("Path", BinaryKind::Cstr),
                BinaryField::new("Tag", BinaryKind::Chars(8)),
                BinaryField::new("Visible", BinaryKind::Bbit),
                BinaryField::new("Solid", BinaryKind::Bbit),
                BinaryField::new("Bounds", BinaryKind::Rect),
                BinaryField::new("Origin", BinaryKind::Nested("Point".into())),
                BinaryField::new("Sound", BinaryKind::Rsrc),
                BinaryField::new("Frames", BinaryKind::Ocnt),
                BinaryField::new("Begin", BinaryKind::Lstc),
                BinaryField::new("Delay", BinaryKind::Hwrd),
                BinaryField::new("Flip", BinaryKind::Bool),
                BinaryField::new("End", BinaryKind::Lste),
                BinaryField::new("Blob", BinaryKind::Hexd),
            ],
        );
        let s = |t: &str| ValueContainer::String(t.to_owned());
        let n = ValueContainer::Integer;
        let values: BTreeMap<String, ValueContainer> = [
            ("Id", n(-70000)),
            ("Mask", n(-1)),
            ("Name", s("hero")),
            ("Path", s("img/hero.png")),
            ("Tag", s("player")),
            ("Visible", n(1)),
            ("Solid", n(0)),
            ("Bounds", ValueContainer::Rect(Rect { top: 0, left: -4, bottom: 32, right: 28 })),
            ("Origin.X", n(16)),
            ("Origin.Y", n(-16)),
            (
                "Sound",
                ValueContainer::Reference(
                    ResourceReference::typed("Sound", 1 << 40).in_container("Extra"),
                ),
            ),
            ("Frames", n(2)),
            ("Delay[0]", n(100)),
            ("Flip[0]", n(0)),
            ("Delay[1]", n(250)),
            ("Flip[1]", n(1)),
            ("Blob", ValueContainer::Data(vec![0xDE, 0xAD])),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();
        round_trip(&types, &def, Format::Extended, values);
    }

    #[test]
    fn classic_references_round_trip_as_bare_ids() {
        let mut types = TypeRegistry::new();
        let def = register(&mut types, "T", "tst ", vec![BinaryField::new("R", BinaryKind::Rsrc)]);
        let values = [("R".to_owned(), ValueContainer::Reference(ResourceReference::new(-5)))]
            .into_iter()
            .collect();
        round_trip(&types, &def, Format::Classic, values);
    }

    #[test]
    fn hexd_must_be_final_to_decode() {
        let mut types = TypeRegistry::new();
        let def = register(
            &mut types,
            "T",
            "tst ",
            vec![
                BinaryField::new("Blob", BinaryKind::Hexd),
                BinaryField::new("After", BinaryKind::Hbyt),
            ],
        );
        let err = Decoder::new(&types, Format::Classic).decode(&def, &[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidValue);
    }

    #[test]
    fn short_payload_is_an_error() {
        let mut types = TypeRegistry::new();
        let def = register(&mut types, "T", "tst ", vec![BinaryField::new("V", BinaryKind::Dlng)]);
        let err = Decoder::new(&types, Format::Classic).decode(&def, &[0, 1]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidValue);
    }

    #[test]
    fn trailing_bytes_are_an_error() {
        let mut types = TypeRegistry::new();
        let def = register(&mut types, "T", "tst ", vec![BinaryField::new("V", BinaryKind::Hbyt)]);
        assert!(Decoder::new(&types, Format::Classic).decode(&def, &[1, 2]).is_err());
    }
}
