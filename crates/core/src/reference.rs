use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lexer::parse_integer;

/// A reference to a resource: `#id`, `#Type.id` or `#Container.Type.id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub id: i64,
}

impl ResourceReference {
    pub fn new(id: i64) -> Self {
        ResourceReference {
            container: None,
            type_name: None,
            id,
        }
    }

    pub fn typed(type_name: impl Into<String>, id: i64) -> Self {
        ResourceReference {
            container: None,
            type_name: Some(type_name.into()),
            id,
        }
    }

    pub fn in_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Parse the body of a reference lexeme (the text after `#`).
    pub fn parse(body: &str) -> Option<Self> {
        let mut parts: Vec<&str> = body.split('.').collect();
        let id = parse_integer(parts.pop()?)?;
        let (container, type_name) = match parts.as_slice() {
            [] => (None, None),
            [type_name] => (None, Some(*type_name)),
            [container, type_name] => (Some(*container), Some(*type_name)),
            _ => return None,
        };
        if container.is_some_and(str::is_empty) || type_name.is_some_and(str::is_empty) {
            return None;
        }
        Some(ResourceReference {
            container: container.map(str::to_owned),
            type_name: type_name.map(str::to_owned),
            id,
        })
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#")?;
        if let Some(container) = &self.container {
            write!(f, "{}.", container)?;
        }
        if let Some(type_name) = &self.type_name {
            write!(f, "{}.", type_name)?;
        }
        write!(f, "{}", self.id)
    }
}
