//! Resolved field values stored on instances.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interpreter::Token;
use crate::reference::ResourceReference;
use crate::types::BinaryKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub top: i16,
    pub left: i16,
    pub bottom: i16,
    pub right: i16,
}

/// A field value after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ValueContainer {
    Nil,
    Integer(i64),
    String(String),
    Reference(ResourceReference),
    Data(Vec<u8>),
    Rect(Rect),
}

impl ValueContainer {
    /// Convert an interpreter value for a slot of `kind`, checking that it
    /// fits the slot.
    pub fn from_token(token: Token, kind: &BinaryKind) -> Result<ValueContainer, String> {
        let value = match (kind, token) {
            (BinaryKind::Rsrc, Token::Reference(r)) => ValueContainer::Reference(r),
            (BinaryKind::Rsrc, Token::Integer(id)) => {
                ValueContainer::Reference(ResourceReference::new(id))
            }
            (BinaryKind::Pstr | BinaryKind::Cstr | BinaryKind::Chars(_), Token::String(s)) => {
                ValueContainer::String(s)
            }
            (BinaryKind::Hexd, Token::String(s)) => ValueContainer::Data(s.into_bytes()),
            (BinaryKind::Hexd, Token::List(items)) => {
                let bytes = items
                    .iter()
                    .map(|t| match t {
                        Token::Integer(n) => u8::try_from(*n)
                            .map_err(|_| format!("byte value {} is out of range", n)),
                        other => Err(format!("expected a byte, found {}", other.type_name())),
                    })
                    .collect::<Result<Vec<u8>, String>>()?;
                ValueContainer::Data(bytes)
            }
            (BinaryKind::Rect, Token::List(items)) => {
                let sides = items
                    .iter()
                    .map(|t| {
                        t.as_integer()
                            .and_then(|n| i16::try_from(n).ok())
                            .ok_or_else(|| format!("rectangle side {} is not a 16-bit integer", t))
                    })
                    .collect::<Result<Vec<i16>, String>>()?;
                let [top, left, bottom, right] = sides[..] else {
                    return Err(format!("a rectangle needs 4 sides, found {}", sides.len()));
                };
                ValueContainer::Rect(Rect {
                    top,
                    left,
                    bottom,
                    right,
                })
            }
            (kind, Token::Integer(n)) if kind.integer_range().is_some() => {
                ValueContainer::Integer(n)
            }
            (kind, token) => {
                return Err(format!(
                    "{} value cannot be stored in a {} field",
                    token.type_name(),
                    kind
                ))
            }
        };
        value.check_fits(kind)?;
        Ok(value)
    }

    /// Verify that the value can be encoded into a slot of `kind`.
    pub fn check_fits(&self, kind: &BinaryKind) -> Result<(), String> {
        match (kind, self) {
            (_, ValueContainer::Nil) => Ok(()),
            (kind, ValueContainer::Integer(n)) => match kind.integer_range() {
                Some((lo, hi)) if (lo..=hi).contains(&(*n as i128)) => Ok(()),
                Some((lo, hi)) => Err(format!(
                    "value {} is out of range for {} ({}..={})",
                    n, kind, lo, hi
                )),
                None => Err(format!("integer value cannot be stored in a {} field", kind)),
            },
            (BinaryKind::Pstr, ValueContainer::String(s)) if s.len() > 255 => Err(format!(
                "string of {} bytes is too long for PSTR (255 max)",
                s.len()
            )),
            (BinaryKind::Chars(width), ValueContainer::String(s)) if s.len() >= *width => {
                Err(format!(
                    "string of {} bytes does not fit {} (at most {})",
                    s.len(),
                    kind,
                    width - 1
                ))
            }
            (BinaryKind::Cstr | BinaryKind::Chars(_), ValueContainer::String(s))
                if s.contains('\0') =>
            {
                Err(format!("{} strings cannot contain NUL bytes", kind))
            }
            (
                BinaryKind::Pstr | BinaryKind::Cstr | BinaryKind::Chars(_),
                ValueContainer::String(_),
            ) => Ok(()),
            (BinaryKind::Hexd, ValueContainer::Data(_)) => Ok(()),
            (BinaryKind::Rect, ValueContainer::Rect(_)) => Ok(()),
            (BinaryKind::Rsrc, ValueContainer::Reference(r)) => {
                let container_ok = r.container.as_ref().map_or(true, |c| c.len() <= 255);
                if container_ok {
                    Ok(())
                } else {
                    Err("container name is too long for a reference".to_owned())
                }
            }
            (kind, value) => Err(format!(
                "{} cannot be stored in a {} field",
                value.describe(),
                kind
            )),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ValueContainer::Nil => "nil",
            ValueContainer::Integer(_) => "integer",
            ValueContainer::String(_) => "string",
            ValueContainer::Reference(_) => "reference",
            ValueContainer::Data(_) => "data",
            ValueContainer::Rect(_) => "rectangle",
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ValueContainer::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The interpreter value a symbol or default stands for.
    pub fn to_token(&self) -> Option<Token> {
        match self {
            ValueContainer::Integer(n) => Some(Token::Integer(*n)),
            ValueContainer::String(s) => Some(Token::String(s.clone())),
            ValueContainer::Reference(r) => Some(Token::Reference(r.clone())),
            ValueContainer::Rect(r) => Some(Token::List(
                [r.top, r.left, r.bottom, r.right]
                    .into_iter()
                    .map(|side| Token::Integer(side.into()))
                    .collect(),
            )),
            ValueContainer::Data(bytes) => Some(Token::List(
                bytes.iter().map(|b| Token::Integer((*b).into())).collect(),
            )),
            ValueContainer::Nil => None,
        }
    }
}

impl fmt::Display for ValueContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueContainer::Nil => f.write_str("nil"),
            ValueContainer::Integer(n) => write!(f, "{}", n),
            ValueContainer::String(s) => write!(f, "{:?}", s),
            ValueContainer::Reference(r) => write!(f, "{}", r),
            ValueContainer::Data(bytes) => {
                f.write_str("<")?;
                for byte in bytes {
                    write!(f, "{:02X}", byte)?;
                }
                f.write_str(">")
            }
            ValueContainer::Rect(r) => write!(
                f,
                "rect({}, {}, {}, {})",
                r.top, r.left, r.bottom, r.right
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_range_checked() {
        assert_eq!(
            ValueContainer::from_token(Token::Integer(42), &BinaryKind::Dwrd),
            Ok(ValueContainer::Integer(42))
        );
        assert!(ValueContainer::from_token(Token::Integer(40000), &BinaryKind::Dwrd).is_err());
        assert!(ValueContainer::from_token(Token::Integer(40000), &BinaryKind::Hwrd).is_ok());
        assert!(ValueContainer::from_token(Token::Integer(-1), &BinaryKind::Hbyt).is_err());
        assert!(ValueContainer::from_token(Token::Integer(2), &BinaryKind::Bool).is_err());
    }

    #[test]
    fn lists_become_rects_and_bytes() {
        let rect = ValueContainer::from_token(
            Token::List(vec![
                Token::Integer(0),
                Token::Integer(1),
                Token::Integer(20),
                Token::Integer(40),
            ]),
            &BinaryKind::Rect,
        )
        .unwrap();
        assert_eq!(
            rect,
            ValueContainer::Rect(Rect {
                top: 0,
                left: 1,
                bottom: 20,
                right: 40
            })
        );
        let data = ValueContainer::from_token(
            Token::List(vec![Token::Integer(0xCA), Token::Integer(0xFE)]),
            &BinaryKind::Hexd,
        )
        .unwrap();
        assert_eq!(data, ValueContainer::Data(vec![0xCA, 0xFE]));
        let short = Token::List(vec![Token::Integer(1)]);
        assert!(ValueContainer::from_token(short, &BinaryKind::Rect).is_err());
    }

    #[test]
    fn strings_respect_slot_limits() {
        assert!(ValueContainer::from_token("x".repeat(256).into(), &BinaryKind::Pstr).is_err());
        assert!(ValueContainer::from_token("abc".into(), &BinaryKind::Chars(4)).is_ok());
        assert!(ValueContainer::from_token("abcd".into(), &BinaryKind::Chars(4)).is_err());
        assert!(ValueContainer::from_token("a\0b".into(), &BinaryKind::Cstr).is_err());
    }

    #[test]
    fn integers_become_bare_references() {
        assert_eq!(
            ValueContainer::from_token(Token::Integer(128), &BinaryKind::Rsrc),
            Ok(ValueContainer::Reference(ResourceReference::new(128)))
        );
    }

    #[test]
    fn mismatched_kinds_are_rejected() {
        let err = ValueContainer::from_token("text".into(), &BinaryKind::Dlng).unwrap_err();
        assert_eq!(err, "string value cannot be stored in a DLNG field");
    }
}
