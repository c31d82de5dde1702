//! Compilation pipeline for picture fragments.
//!
//! This module provides:
//! - Collaborator traits for the external compiler and preamble precompiler
//! - Fragment wrapping and parallel fan-out compilation
//! - A `pdflatex`-backed toolchain
//!
//! # Architecture
//!
//! ```text
//! Document preamble ──► preamble.tex ──► Precompiler ──► preamble.fmt
//!                                                            │
//! Fragment content ──► fragment-<uuid>.tex ──► Compiler ─────┴──► fragment-<uuid>.pdf
//! ```

mod pipeline;
mod toolchain;

use std::path::Path;

use crate::error::Result;

pub use pipeline::{CompileOutcome, compile_fragment, compile_fragments, wrap_fragment, wrap_preamble};
pub use toolchain::LatexToolchain;

/// Compiles a wrapped fragment source into its target artifact.
///
/// The artifact is produced next to `source` with the target extension.
pub trait Compiler: Send + Sync {
    fn compile(&self, source: &Path) -> Result<()>;
}

/// Turns a preamble source into a precompiled format in the same directory.
pub trait Precompiler: Send + Sync {
    fn precompile(&self, preamble: &Path) -> Result<()>;
}
