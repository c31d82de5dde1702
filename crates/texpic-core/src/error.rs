//! Error types for texpic-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::document::Range;
use crate::session::FragmentId;

/// Result type for texpic-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in texpic-core.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TeX toolchain could not be located or started.
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// Compiling a fragment failed.
    #[error("compilation failed for {}: {message}", source_file.display())]
    Compilation { source_file: PathBuf, message: String },

    /// Precompiling the shared preamble failed.
    #[error("preamble precompilation failed: {0}")]
    Precompile(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// No session is open for the document.
    #[error("no preview session for {}", .0.display())]
    SessionNotFound(PathBuf),

    /// Fragment is not tracked by the session.
    #[error("fragment not found: {0}")]
    FragmentNotFound(FragmentId),

    /// Range is reversed or lies outside the document.
    #[error("invalid range {0}")]
    InvalidRange(Range),

    /// The preview service loop is no longer running.
    #[error("preview service stopped")]
    ServiceStopped,
}

impl Error {
    /// Render the error together with a short recovery hint.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Self::Toolchain(_) => Some("install a TeX distribution providing pdflatex and mylatexformat"),
            Self::Precompile(_) => Some("check the document preamble for errors; see preamble.log in the scratch directory"),
            Self::Config(_) => Some("configuration keys are delay, timeout, preambleContents and parseTeXFile"),
            Self::InvalidRange(_) => Some("lines and columns are zero based"),
            Self::SessionNotFound(_) => Some("open a preview for the document first"),
            _ => None,
        };

        match hint {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}
