//! Compilation options.
//!
//! Options are plain serde data so front ends can load them from any format;
//! the `kdlc` binary reads them from TOML:
//!
//! ```toml
//! format = "extended"
//! default_unit = "game.ndat"
//! first_auto_id = 1000
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target resource-file flavour. Only affects how resource references are
/// packed into payloads; the file framing itself is the writer's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Classic,
    Extended,
    Rez,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Classic => "classic",
            Format::Extended => "extended",
            Format::Rez => "rez",
        }
    }

    /// Whether references carry container, type and a 64-bit id.
    pub fn has_extended_references(self) -> bool {
        self == Format::Extended
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Format::Classic),
            "extended" => Ok(Format::Extended),
            "rez" => Ok(Format::Rez),
            other => Err(format!(
                "unknown format '{}': expected classic, extended or rez",
                other
            )),
        }
    }
}

fn default_unit() -> String {
    "output".to_owned()
}

fn default_first_auto_id() -> i64 {
    128
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileOptions {
    #[serde(default)]
    pub format: Format,
    /// Unit that receives declarations until an `@out` directive.
    #[serde(default = "default_unit")]
    pub default_unit: String,
    /// Lowest id handed out for `#auto`.
    #[serde(default = "default_first_auto_id")]
    pub first_auto_id: i64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            format: Format::default(),
            default_unit: default_unit(),
            first_auto_id: default_first_auto_id(),
        }
    }
}
