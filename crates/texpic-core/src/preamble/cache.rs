//! Per-session preamble memoization.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::compile::{CompileOutcome, Compiler, Precompiler, compile_fragments, wrap_preamble};
use crate::document::Document;
use crate::error::Result;
use crate::session::{Fragment, FragmentId, Session};

use super::extract::{ExtractOptions, Scope, extract};

/// Result of [`PreambleCache::check_and_refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreambleStatus {
    /// The committed preamble is current. Nothing was compiled.
    Stable,
    /// A new preamble was committed and every fragment was recompiled.
    Updated(Vec<(FragmentId, CompileOutcome)>),
}

impl PreambleStatus {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Detects preamble changes and cascades them to every fragment.
#[derive(Clone)]
pub struct PreambleCache {
    compiler: Arc<dyn Compiler>,
    precompiler: Arc<dyn Precompiler>,
}

impl PreambleCache {
    pub fn new(compiler: Arc<dyn Compiler>, precompiler: Arc<dyn Precompiler>) -> Self {
        Self {
            compiler,
            precompiler,
        }
    }

    pub fn compiler(&self) -> &dyn Compiler {
        self.compiler.as_ref()
    }

    /// Re-extract the preamble and, if it differs from the committed one,
    /// precompile it and recompile every fragment of the session.
    ///
    /// A failed precompile leaves the committed preamble and the pending set
    /// untouched, so the next pass retries.
    pub fn check_and_refresh(
        &self,
        session: &mut Session,
        doc: &dyn Document,
        scope: Scope,
        options: &ExtractOptions,
    ) -> Result<PreambleStatus> {
        let document_dir = doc.path().parent().unwrap_or(Path::new("."));
        let candidate = extract(&doc.text(), document_dir, scope, options);

        if candidate == session.preamble {
            return Ok(PreambleStatus::Stable);
        }

        let source = session.preamble_source();
        session.work_dir()?;
        fs::write(&source, wrap_preamble(&candidate))?;
        self.precompiler.precompile(&source)?;

        session.preamble = candidate;
        tracing::info!(
            "Preamble of {} changed, recompiling {} fragments",
            doc.path().display(),
            session.len()
        );

        let fragments: Vec<&Fragment> = session.fragments().iter().collect();
        let outcomes = compile_fragments(&fragments, self.compiler.as_ref());
        session.pending.clear();

        Ok(PreambleStatus::Updated(outcomes))
    }
}
