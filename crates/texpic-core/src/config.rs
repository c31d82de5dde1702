//! Preview configuration.
//!
//! # Example
//!
//! ```json
//! {
//!   "delay": 500,                       // debounce interval in ms, 0 disables tracking
//!   "timeout": 10000,                   // drop batches idle longer than this, 0 never drops
//!   "preambleContents": "styles.tex",   // extra declarations, absolute or workspace-relative
//!   "parseTeXFile": true                // scan the document for declarations
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::preamble::ExtractOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewConfig {
    /// Debounce interval for edit-triggered recompilation.
    #[serde(with = "millis")]
    pub delay: Duration,

    /// Maximum time since the last edit before a pending pass is dropped.
    #[serde(with = "millis")]
    pub timeout: Duration,

    /// File with extra style declarations appended to every preamble.
    pub preamble_contents: Option<PathBuf>,

    /// Whether to scan the document itself for declarations.
    #[serde(rename = "parseTeXFile")]
    pub parse_tex_file: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            timeout: Duration::from_millis(10_000),
            preamble_contents: None,
            parse_tex_file: true,
        }
    }
}

impl PreviewConfig {
    /// Edits are tracked only with a nonzero delay.
    pub fn tracking_enabled(&self) -> bool {
        !self.delay.is_zero()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Absolute path of the extra declarations file, if configured.
    pub fn resolve_preamble_contents(&self, workspace: &Path) -> Option<PathBuf> {
        let path = self.preamble_contents.as_ref()?;
        if path.as_os_str().is_empty() {
            return None;
        }
        Some(if path.is_absolute() {
            path.clone()
        } else {
            workspace.join(path)
        })
    }

    /// Text of the extra declarations file; empty when unset or unreadable.
    pub fn extra_declarations(&self, workspace: &Path) -> String {
        let Some(path) = self.resolve_preamble_contents(workspace) else {
            return String::new();
        };

        match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("skipping preamble contents {}: {}", path.display(), e);
                String::new()
            }
        }
    }

    /// Extraction options for documents in `workspace`.
    pub fn extract_options(&self, workspace: &Path) -> ExtractOptions {
        ExtractOptions {
            parse_document: self.parse_tex_file,
            extra_declarations: self.extra_declarations(workspace),
        }
    }
}

/// `Duration` as integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
