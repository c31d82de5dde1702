//! Shared argument handling for the subcommands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use texpic_core::document::Position;
use texpic_core::{Document, PreviewConfig, Range, TextDocument, locate};

/// Configuration from `--config`, or `texpic.json` next to the document, or
/// the defaults.
pub fn load_config(explicit: Option<&Path>, document: &Path) -> anyhow::Result<PreviewConfig> {
    if let Some(path) = explicit {
        return Ok(PreviewConfig::load(path)?);
    }

    let sibling = workspace_of(document).join("texpic.json");
    if sibling.is_file() {
        tracing::debug!("using {}", sibling.display());
        return Ok(PreviewConfig::load(&sibling)?);
    }
    Ok(PreviewConfig::default())
}

/// Absolute path of an existing document.
pub fn resolve_document(file: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(file);
    if !path.exists() {
        anyhow::bail!("Document not found: {}", file);
    }
    Ok(path.canonicalize()?)
}

pub fn read_document(path: &Path) -> anyhow::Result<TextDocument> {
    TextDocument::load(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Directory relative paths in the configuration are resolved against.
pub fn workspace_of(document: &Path) -> PathBuf {
    document
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Picture enclosing the 1-based `line`.
pub fn picture_at(doc: &TextDocument, line: u32) -> anyhow::Result<Range> {
    if line == 0 || line > doc.line_count() {
        anyhow::bail!(
            "Line {} is outside {} ({} lines)",
            line,
            doc.path().display(),
            doc.line_count()
        );
    }

    let at = Position::new(line - 1, 0);
    let range = locate(doc, at)
        .or_else(|| {
            let width = doc.line(line - 1).map(|l| l.chars().count()).unwrap_or(0) as u32;
            locate(doc, Position::new(line - 1, width))
        })
        .with_context(|| format!("No tikzpicture at line {}", line))?;
    Ok(range)
}

/// Where a rendered picture is copied: `<stem>-<line>.pdf` next to the document.
pub fn default_output(document: &Path, line: u32) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "figure".to_string());
    workspace_of(document).join(format!("{}-{}.pdf", stem, line))
}
