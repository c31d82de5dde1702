//! Fragment wrapping and compilation fan-out.

use std::fs;
use std::time::Instant;

use rayon::prelude::*;

use crate::session::{Fragment, FragmentId};

use super::Compiler;

/// Result of compiling one fragment.
///
/// Failures are logged where they happen and never propagate further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    Success,
    Failed,
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Standalone source for a fragment, loading the precompiled `preamble` format.
pub fn wrap_fragment(content: &str) -> String {
    format!("%&preamble\n\\begin{{document}}\n{}\n\\end{{document}}\n", content)
}

/// Preamble source that `mylatexformat` dumps into a format.
pub fn wrap_preamble(preamble: &str) -> String {
    format!(
        "\\documentclass{{standalone}}\n{}\\begin{{document}}\n\\end{{document}}\n",
        preamble
    )
}

/// Write the fragment's source and run the compiler on it.
pub fn compile_fragment(fragment: &Fragment, compiler: &dyn Compiler) -> CompileOutcome {
    let source = &fragment.artifact.source;

    if let Err(e) = fs::write(source, wrap_fragment(&fragment.content)) {
        tracing::warn!("{}: failed to write {}: {}", fragment.id, source.display(), e);
        return CompileOutcome::Failed;
    }

    let start = Instant::now();
    match compiler.compile(source) {
        Ok(()) => {
            tracing::info!(
                "Compiled {} in {}ms",
                fragment.id,
                start.elapsed().as_millis()
            );
            CompileOutcome::Success
        }
        Err(e) => {
            tracing::warn!("{}: {}", fragment.id, e);
            CompileOutcome::Failed
        }
    }
}

/// Compile fragments in parallel; returns once all have finished.
pub fn compile_fragments(
    fragments: &[&Fragment],
    compiler: &dyn Compiler,
) -> Vec<(FragmentId, CompileOutcome)> {
    fragments
        .par_iter()
        .map(|fragment| (fragment.id, compile_fragment(fragment, compiler)))
        .collect()
}
