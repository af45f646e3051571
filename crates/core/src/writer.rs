//! Output seam: compiled units go to a [`ContainerWriter`].
//!
//! The real resource-file framing lives outside this crate. The bundled
//! [`DirectoryWriter`] lays each unit out as a directory of raw payloads plus
//! a `manifest.json` describing them.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::diagnostic::{Diagnostic, ErrorKind, Result};
use crate::project::{Project, ProjectMetadata, ResourceEntry};

/// Receives one unit at a time, entries in container/type/id order.
pub trait ContainerWriter {
    fn write(
        &mut self,
        metadata: &ProjectMetadata,
        unit: &str,
        entries: &[ResourceEntry],
    ) -> Result<()>;
}

/// Hand every unit of `project` to `writer`. Returns the number of units.
pub fn write_project(project: &Project, writer: &mut dyn ContainerWriter) -> Result<usize> {
    let mut written = 0;
    for unit in project.units() {
        writer.write(&project.metadata, unit.path(), &unit.entries())?;
        written += 1;
    }
    Ok(written)
}

/// Writes `<root>/<unit>/<namespace>/<Type>.<id>.bin` and
/// `<root>/<unit>/manifest.json`.
#[derive(Debug, Clone)]
pub struct DirectoryWriter {
    root: PathBuf,
}

#[derive(Serialize)]
struct Manifest<'a> {
    unit: &'a str,
    #[serde(flatten)]
    metadata: &'a ProjectMetadata,
    resources: Vec<ManifestEntry<'a>>,
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    container: &'a str,
    type_code: String,
    type_name: &'a str,
    id: i64,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
    file: String,
    size: usize,
    sha256: String,
}

/// Namespace directory for the global namespace.
const GLOBAL_DIR: &str = "_global";

impl DirectoryWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryWriter { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unit_dir(&self, unit: &str) -> Result<PathBuf> {
        let relative = Path::new(unit);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained || unit.is_empty() {
            return Err(Diagnostic::new(
                ErrorKind::InvalidValue,
                format!(
                    "unit path '{}' must be relative and stay inside the output directory",
                    unit
                ),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl ContainerWriter for DirectoryWriter {
    fn write(
        &mut self,
        metadata: &ProjectMetadata,
        unit: &str,
        entries: &[ResourceEntry],
    ) -> Result<()> {
        let dir = self.unit_dir(unit)?;
        let mut resources = Vec::with_capacity(entries.len());
        for entry in entries {
            let namespace = if entry.container.is_empty() {
                GLOBAL_DIR
            } else {
                entry.container.as_str()
            };
            let file = format!("{}/{}.{}.bin", namespace, entry.type_name, entry.id);
            let path = dir.join(&file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
            fs::write(&path, &entry.data).map_err(|e| io_error(&path, e))?;
            resources.push(ManifestEntry {
                container: &entry.container,
                type_code: entry.type_code.to_string(),
                type_name: &entry.type_name,
                id: entry.id,
                name: &entry.name,
                file,
                size: entry.data.len(),
                sha256: format!("{:x}", Sha256::digest(&entry.data)),
            });
        }

        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        let manifest = Manifest {
            unit,
            metadata,
            resources,
        };
        let json = serde_json::to_string_pretty(&manifest).map_err(|e| {
            Diagnostic::new(ErrorKind::Io, format!("cannot serialize manifest: {}", e))
        })?;
        let manifest_path = dir.join("manifest.json");
        fs::write(&manifest_path, json + "\n").map_err(|e| io_error(&manifest_path, e))?;
        debug!(unit, resources = entries.len(), dir = %dir.display(), "wrote unit");
        Ok(())
    }
}

fn io_error(path: &Path, err: std::io::Error) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Io,
        format!("cannot write '{}': {}", path.display(), err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeCode;

    fn entry(container: &str, id: i64, data: &[u8]) -> ResourceEntry {
        ResourceEntry {
            container: container.to_owned(),
            type_code: TypeCode::parse("spr#").unwrap(),
            type_name: "Sprite".to_owned(),
            id,
            name: format!("sprite {}", id),
            data: data.to_vec(),
        }
    }

    #[test]
    fn writes_payloads_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DirectoryWriter::new(dir.path());
        let metadata = ProjectMetadata {
            name: Some("Demo".into()),
            ..ProjectMetadata::default()
        };
        writer
            .write(&metadata, "game.ndat", &[entry("", 128, &[1, 2]), entry("Ui", 5, &[])])
            .unwrap();

        let unit = dir.path().join("game.ndat");
        assert_eq!(fs::read(unit.join("_global/Sprite.128.bin")).unwrap(), vec![1, 2]);
        assert!(unit.join("Ui/Sprite.5.bin").exists());

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(unit.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["unit"], "game.ndat");
        assert_eq!(manifest["name"], "Demo");
        let resources = manifest["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0]["type_code"], "spr#");
        assert_eq!(resources[0]["size"], 2);
        assert!(resources[0].get("container").is_none());
        assert_eq!(resources[1]["container"], "Ui");
        assert_eq!(
            resources[1]["sha256"],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn unit_paths_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DirectoryWriter::new(dir.path());
        let err = writer
            .write(&ProjectMetadata::default(), "../outside", &[])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidValue);
        let err = writer
            .write(&ProjectMetadata::default(), "/abs", &[])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidValue);
    }
}
