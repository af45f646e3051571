//! Where KDL source text comes from.
//!
//! The compiler never touches `std::fs` directly; it asks a
//! [`SourceProvider`] for file text and for the location of `@import`
//! targets. [`FileSystemProvider`] serves real files, [`InMemoryProvider`]
//! serves a fixed set of named buffers (tests, embedding).

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait SourceProvider {
    /// Full text of the file at `path`.
    fn read_source(&self, path: &Path) -> io::Result<String>;

    /// Path of `import` written inside the file `importer`.
    fn resolve_import(&self, importer: &Path, import: &str) -> io::Result<PathBuf>;

    /// Stable identity of `path`, used to detect import cycles.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

pub struct FileSystemProvider;

impl SourceProvider for FileSystemProvider {
    fn read_source(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn resolve_import(&self, importer: &Path, import: &str) -> io::Result<PathBuf> {
        let base = importer.parent().unwrap_or_else(|| Path::new(""));
        Ok(base.join(import))
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        path.canonicalize()
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryProvider {
    files: HashMap<PathBuf, String>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style.
    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files.insert(normalize_path(path.as_ref()), text.into());
    }
}

impl SourceProvider for InMemoryProvider {
    fn read_source(&self, path: &Path) -> io::Result<String> {
        let normalized = normalize_path(path);
        self.files.get(&normalized).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no in-memory source named {}", normalized.display()),
            )
        })
    }

    fn resolve_import(&self, importer: &Path, import: &str) -> io::Result<PathBuf> {
        let base = importer.parent().unwrap_or_else(|| Path::new(""));
        Ok(normalize_path(&base.join(import)))
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(normalize_path(path))
    }
}

/// Resolve `.` and `..` lexically.
fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d.kdl")), PathBuf::from("/a/c/d.kdl"));
        assert_eq!(normalize_path(Path::new("../x.kdl")), PathBuf::from("../x.kdl"));
        assert_eq!(normalize_path(Path::new("/../x.kdl")), PathBuf::from("/x.kdl"));
    }

    #[test]
    fn imports_resolve_next_to_the_importer() {
        let provider = InMemoryProvider::new().with_file("game/types/sprite.kdl", "");
        let resolved = provider
            .resolve_import(Path::new("game/main.kdl"), "types/sprite.kdl")
            .unwrap();
        assert_eq!(resolved, PathBuf::from("game/types/sprite.kdl"));
        assert!(provider.read_source(&resolved).is_ok());
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = InMemoryProvider::new()
            .read_source(Path::new("nope.kdl"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn filesystem_provider_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.kdl");
        std::fs::write(&path, "@project \"x\";").unwrap();
        let provider = FileSystemProvider;
        assert_eq!(provider.read_source(&path).unwrap(), "@project \"x\";");
        assert_eq!(
            provider.resolve_import(&path, "other.kdl").unwrap(),
            dir.path().join("other.kdl")
        );
    }
}
