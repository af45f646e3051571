//! Compile options for `kdlc`.
//!
//! Options come from an optional TOML file; command-line flags win over the
//! file.
//!
//! # Example
//!
//! ```toml
//! format = "extended"
//! default_unit = "game.ndat"
//! first_auto_id = 1000
//! ```

use std::path::Path;

use kdl_core::{CompileOptions, Format};

/// Read and parse an options TOML file from `path`.
///
/// Returns a human-readable error string on failure.
pub fn read_options(path: &Path) -> Result<CompileOptions, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Options from `config` (or defaults) with `format` applied on top.
pub fn resolve(config: Option<&Path>, format: Option<Format>) -> Result<CompileOptions, String> {
    let mut options = match config {
        Some(path) => read_options(path)?,
        None => CompileOptions::default(),
    };
    if let Some(format) = format {
        options.format = format;
    }
    Ok(options)
}
