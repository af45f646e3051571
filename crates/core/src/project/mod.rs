//! Intermediate project model.
//!
//! `Project` → `Unit` (output path) → `NamedContainer` (namespace) →
//! `ResourceContainer` (type code) → `Instance` (id). Every level is a
//! get-or-create lookup that hands back the entry it found or inserted.

pub mod container;
pub mod instance;
pub mod keyed;
pub mod unit;

use serde::{Deserialize, Serialize};

use tracing::debug;

use crate::config::Format;
use crate::diagnostic::{Diagnostic, ErrorKind, Result};
use crate::encoder::Encoder;
use crate::types::TypeRegistry;

pub use container::{NamedContainer, ResourceContainer};
pub use instance::{Instance, ResourceEntry};
pub use unit::Unit;

use keyed::KeyedMap;

/// Descriptive metadata handed to the container writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProjectMetadata {
    /// Apply a metadata directive. Returns false for unknown keys.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let value = value.to_owned();
        match key {
            "project" => self.name = Some(value),
            "author" => self.authors.push(value),
            "version" => self.version = Some(value),
            "license" => self.license = Some(value),
            "copyright" => self.copyright = Some(value),
            "email" => self.email = Some(value),
            _ => return false,
        }
        true
    }
}

/// Output of one compilation. Carries the type registry and format the
/// payloads were encoded with.
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub metadata: ProjectMetadata,
    pub format: Format,
    pub types: TypeRegistry,
    units: KeyedMap<Unit>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(format: Format) -> Self {
        Project {
            format,
            ..Self::default()
        }
    }

    pub fn unit(&mut self, path: &str, allow_creation: bool) -> Option<&mut Unit> {
        self.units
            .get_or_create(path, allow_creation, || Unit::new(path))
    }

    pub fn get_unit(&self, path: &str) -> Option<&Unit> {
        self.units.get(path)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Encode every instance's values into its `data`. Returns the number of
    /// resources encoded.
    pub fn encode(&mut self) -> Result<usize> {
        let encoder = Encoder::new(&self.types, self.format);
        let mut encoded = 0;
        for unit in self.units.iter_mut() {
            let path = unit.path().to_owned();
            let instances = unit
                .containers_mut()
                .flat_map(|ns| ns.resource_containers_mut())
                .flat_map(|rc| rc.instances_mut());
            for instance in instances {
                let definition = self.types.by_code(instance.type_code).ok_or_else(|| {
                    Diagnostic::new(
                        ErrorKind::UnresolvedSymbol,
                        format!("no type is registered for code '{}'", instance.type_code),
                    )
                })?;
                instance.data = encoder.encode(definition, &instance.values).map_err(|diag| {
                    diag.with_info(format!("while encoding resource {}", instance.reference))
                })?;
                encoded += 1;
            }
            debug!(unit = %path, "encoded unit");
        }
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::ErrorKind;
    use crate::reference::ResourceReference;
    use crate::types::TypeCode;

    #[test]
    fn hierarchy_is_created_on_demand() {
        let mut project = Project::new();
        assert!(project.unit("game.ndat", false).is_none());
        let code = TypeCode::parse("snd ").unwrap();
        let instance = project
            .unit("game.ndat", true)
            .and_then(|u| u.container("", true))
            .and_then(|ns| ns.resource_container(code, true))
            .map(|rc| rc.construct(ResourceReference::typed("Sound", 128), "Boom"));
        assert!(matches!(instance, Some(Ok(_))));
        let unit = project.get_unit("game.ndat").unwrap();
        assert_eq!(unit.resource_count(), 1);
        assert_eq!(unit.entries()[0].name, "Boom");
    }

    #[test]
    fn same_id_in_different_namespaces_is_allowed() {
        let mut project = Project::new();
        let code = TypeCode::parse("snd ").unwrap();
        let unit = project.unit("out", true).unwrap();
        for ns in ["", "Extra"] {
            unit.container(ns, true)
                .and_then(|c| c.resource_container(code, true))
                .unwrap()
                .construct(ResourceReference::new(128), "")
                .unwrap();
        }
        assert_eq!(unit.resource_count(), 2);
    }

    #[test]
    fn same_id_in_same_namespace_is_duplicate() {
        let mut project = Project::new();
        let code = TypeCode::parse("snd ").unwrap();
        let rc = project
            .unit("out", true)
            .and_then(|u| u.container("", true))
            .and_then(|ns| ns.resource_container(code, true))
            .unwrap();
        rc.construct(ResourceReference::new(1), "a").unwrap();
        let err = rc.construct(ResourceReference::new(1), "b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateResource);
    }

    #[test]
    fn with_format_starts_empty() {
        let project = Project::with_format(Format::Extended);
        assert_eq!(project.format, Format::Extended);
        assert_eq!(project.units().count(), 0);
        assert!(project.types.is_empty());
    }

    #[test]
    fn metadata_directives() {
        let mut meta = ProjectMetadata::default();
        assert!(meta.set("author", "A"));
        assert!(meta.set("author", "B"));
        assert!(meta.set("version", "1.2"));
        assert!(!meta.set("colour", "red"));
        assert_eq!(meta.authors, vec!["A", "B"]);
        assert_eq!(meta.version.as_deref(), Some("1.2"));
    }
}
