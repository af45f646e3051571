//! Validates the manifests written by `DirectoryWriter` for the demo fixture
//! against the formal schema at schema/manifest-schema.json.

use std::path::{Path, PathBuf};

use kdl_core::{compile, write_project, CompileOptions, DirectoryWriter, FileSystemProvider};

fn workspace_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..").join(relative)
}

fn collect_manifests(dir: &Path, found: &mut Vec<PathBuf>) {
    for entry in std::fs::read_dir(dir).unwrap().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            collect_manifests(&path, found);
        } else if path.file_name().is_some_and(|name| name == "manifest.json") {
            found.push(path);
        }
    }
}

#[test]
fn demo_manifests_match_schema() {
    let schema_path = workspace_path("schema/manifest-schema.json");
    let schema_src = std::fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("Failed to read schema at {}: {}", schema_path.display(), e));
    let schema_value: serde_json::Value = serde_json::from_str(&schema_src).unwrap();
    let validator = jsonschema::validator_for(&schema_value)
        .unwrap_or_else(|e| panic!("Failed to compile schema: {}", e));

    let project = compile(
        workspace_path("fixtures/demo.kdl"),
        &FileSystemProvider,
        CompileOptions::default(),
    )
    .unwrap_or_else(|diag| panic!("demo fixture failed to compile:\n{}", diag.report()));

    let out = tempfile::tempdir().unwrap();
    let units = write_project(&project, &mut DirectoryWriter::new(out.path())).unwrap();
    assert_eq!(units, 1);

    let mut manifests = Vec::new();
    collect_manifests(out.path(), &mut manifests);
    assert_eq!(manifests.len(), units, "one manifest per unit");

    let mut failures = Vec::new();
    for path in &manifests {
        let instance: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        if let Err(error) = validator.validate(&instance) {
            failures.push(format!("{}: {}", path.display(), error));
        }
        assert_eq!(instance["resources"].as_array().map(Vec::len), Some(4));
    }
    assert!(
        failures.is_empty(),
        "Schema validation failed:\n{}",
        failures.join("\n")
    );
}
