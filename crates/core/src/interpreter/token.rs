use std::fmt;

use crate::reference::ResourceReference;

/// A runtime value of the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    String(String),
    Integer(i64),
    Reference(ResourceReference),
    List(Vec<Token>),
}

impl Token {
    pub fn type_name(&self) -> &'static str {
        match self {
            Token::String(_) => "string",
            Token::Integer(_) => "integer",
            Token::Reference(_) => "reference",
            Token::List(_) => "list",
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Token::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::String(s) => f.write_str(s),
            Token::Integer(n) => write!(f, "{}", n),
            Token::Reference(r) => write!(f, "{}", r),
            Token::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Token {
    fn from(n: i64) -> Self {
        Token::Integer(n)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::String(s.to_owned())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::String(s)
    }
}

impl From<ResourceReference> for Token {
    fn from(r: ResourceReference) -> Self {
        Token::Reference(r)
    }
}
