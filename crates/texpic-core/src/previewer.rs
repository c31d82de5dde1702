//! Preview orchestration.
//!
//! The [`Previewer`] owns every session and drives the whole cycle:
//!
//! ```text
//! view(doc, range) ──► resolve ──► preamble refresh ──► compile ──► refresh/open viewer
//!
//! on_edit(doc, edits) ──► region::apply_all ──► pending + debouncer.touch
//!                                                     │
//! poll(doc, now) ◄──────── deadline passes ───────────┘
//!   └─► gate ──► preamble refresh ──┬─ updated: every fragment was compiled
//!                                   └─ stable:  compile pending fragments
//! ```
//!
//! Edit application is single threaded; only compilation fans out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::FragmentCache;
use crate::compile::{
    CompileOutcome, Compiler, Precompiler, compile_fragment, compile_fragments,
};
use crate::config::PreviewConfig;
use crate::document::{Document, Range, TextDocument, TextEdit};
use crate::error::{Error, Result};
use crate::preamble::{PreambleCache, PreambleStatus, Scope};
use crate::region::{self, EditOutcome};
use crate::session::{ArtifactHandle, Fragment, FragmentId, Session, SessionStore};
use crate::viewer::Viewer;

/// What a recompilation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Fragments dropped because nobody was viewing them.
    pub collected: Vec<FragmentId>,
    pub preamble_updated: bool,
    pub compiled: Vec<FragmentId>,
    pub failed: Vec<FragmentId>,
}

/// Result of a due [`Previewer::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The batch went stale and was discarded.
    Dropped { pending: usize },
    Ran(PassReport),
}

pub struct Previewer {
    config: PreviewConfig,
    workspace: PathBuf,
    store: SessionStore,
    fragments: FragmentCache,
    preamble: PreambleCache,
    viewer: Arc<dyn Viewer>,
}

impl Previewer {
    pub fn new(
        config: PreviewConfig,
        workspace: impl Into<PathBuf>,
        compiler: Arc<dyn Compiler>,
        precompiler: Arc<dyn Precompiler>,
        viewer: Arc<dyn Viewer>,
    ) -> Result<Self> {
        let store = SessionStore::new(config.delay)?;
        tracing::debug!("scratch root at {}", store.root().display());

        Ok(Self {
            config,
            workspace: workspace.into(),
            store,
            fragments: FragmentCache::new(),
            preamble: PreambleCache::new(compiler, precompiler),
            viewer,
        })
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn session(&self, document: &Path) -> Option<&Session> {
        self.store.get(document)
    }

    pub fn fragment_cache(&self) -> &FragmentCache {
        &self.fragments
    }

    /// Compile the fragment at `range` and show it.
    ///
    /// A request for the exact bounds of a tracked fragment reuses it. On
    /// success the target is refreshed if it is already viewed, or opened
    /// with focus otherwise. Compiler failures are not errors; the returned
    /// handle then points at a stale or missing target.
    pub fn view(&mut self, doc: &dyn Document, range: Range) -> Result<ArtifactHandle> {
        if !doc.is_valid(range) {
            return Err(Error::InvalidRange(range));
        }

        let options = self.config.extract_options(&self.workspace);
        let session = self.store.get_or_create(doc.path());
        let resolved = self.fragments.resolve(session, doc, range)?;

        if !resolved.created
            && let Some(fragment) = session.get_mut(resolved.id)
        {
            fragment.content = doc.text_in(range);
        }

        let status = self
            .preamble
            .check_and_refresh(session, doc, Scope::Document, &options)?;

        let outcome = match status {
            PreambleStatus::Stable => {
                let fragment = session
                    .get(resolved.id)
                    .ok_or(Error::FragmentNotFound(resolved.id))?;
                compile_fragment(fragment, self.preamble.compiler())
            }
            PreambleStatus::Updated(outcomes) => {
                refresh_compiled(session, self.viewer.as_ref(), &outcomes, Some(resolved.id));
                outcomes
                    .iter()
                    .find(|(id, _)| *id == resolved.id)
                    .map(|(_, outcome)| *outcome)
                    .unwrap_or(CompileOutcome::Failed)
            }
        };
        session.pending.remove(&resolved.id);

        let target = &resolved.artifact.target;
        if outcome.is_success() {
            if self.viewer.has_active_viewer(target) {
                self.viewer.refresh(target);
            } else {
                self.viewer.open(target, true);
            }
        }

        Ok(resolved.artifact)
    }

    /// Apply a batch of edits to `doc` and track them.
    ///
    /// `doc` is the document before the batch. When tracking is disabled or
    /// the document has no session the text is still updated. Deleted
    /// fragments are released immediately; changed ones wait for the next
    /// pass. An invalid edit rejects the whole batch.
    pub fn on_edit(
        &mut self,
        doc: &mut TextDocument,
        edits: &[TextEdit],
        now: Instant,
    ) -> Result<EditOutcome> {
        let session = match self.store.get_mut(doc.path()) {
            Some(session) if self.config.tracking_enabled() => session,
            _ => {
                doc.apply_all(edits)?;
                return Ok(EditOutcome::default());
            }
        };

        let outcome = region::apply_all(session, doc, edits, now)?;
        self.fragments.release(&outcome.deleted);
        session.pending.extend(outcome.changed.iter().copied());
        session.last_activity = now;

        if !session.is_empty() {
            session.debouncer.touch(now);
        }
        Ok(outcome)
    }

    /// Earliest debounce deadline over all sessions.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.store
            .sessions()
            .filter_map(|s| s.debouncer.deadline())
            .min()
    }

    /// Documents whose debounce deadline has passed.
    pub fn due(&self, now: Instant) -> Vec<PathBuf> {
        self.store
            .sessions()
            .filter(|s| s.debouncer.deadline().is_some_and(|d| d <= now))
            .map(|s| s.document().to_path_buf())
            .collect()
    }

    /// Run the pass for `doc` if its debounce deadline has passed.
    ///
    /// A batch whose last activity is older than the configured timeout is
    /// dropped instead of compiled.
    pub fn poll(&mut self, doc: &dyn Document, now: Instant) -> Result<Option<PassOutcome>> {
        let timeout = self.config.timeout;
        let Some(session) = self.store.get_mut(doc.path()) else {
            return Ok(None);
        };
        if !session.debouncer.take_if_ready(now) {
            return Ok(None);
        }

        if !timeout.is_zero() && now.saturating_duration_since(session.last_activity) > timeout {
            let pending = session.pending.len();
            session.pending.clear();
            tracing::warn!(
                "Dropping stale batch of {} fragments for {}",
                pending,
                doc.path().display()
            );
            return Ok(Some(PassOutcome::Dropped { pending }));
        }

        self.run_pass(doc).map(|report| Some(PassOutcome::Ran(report)))
    }

    /// Disarm the debouncer of `document` and forget its queued fragments.
    pub fn cancel_pending(&mut self, document: &Path) {
        if let Some(session) = self.store.get_mut(document) {
            session.debouncer.cancel();
            session.pending.clear();
        }
    }

    /// Run the pass for `doc` now, regardless of the debouncer.
    pub fn flush(&mut self, doc: &dyn Document) -> Result<PassReport> {
        if let Some(session) = self.store.get_mut(doc.path()) {
            session.debouncer.cancel();
        }
        self.run_pass(doc)
    }

    fn run_pass(&mut self, doc: &dyn Document) -> Result<PassReport> {
        let options = self.config.extract_options(&self.workspace);
        let session = self
            .store
            .get_mut(doc.path())
            .ok_or_else(|| Error::SessionNotFound(doc.path().to_path_buf()))?;

        let mut report = PassReport {
            collected: self.fragments.gate(session, self.viewer.as_ref()),
            ..Default::default()
        };
        if session.is_empty() {
            return Ok(report);
        }

        let outcomes = match self
            .preamble
            .check_and_refresh(session, doc, Scope::Document, &options)?
        {
            PreambleStatus::Updated(outcomes) => {
                report.preamble_updated = true;
                outcomes
            }
            PreambleStatus::Stable => {
                let queued: Vec<&Fragment> = session
                    .fragments()
                    .iter()
                    .filter(|f| session.pending.contains(&f.id))
                    .collect();
                compile_fragments(&queued, self.preamble.compiler())
            }
        };
        session.pending.clear();

        refresh_compiled(session, self.viewer.as_ref(), &outcomes, None);
        for (id, outcome) in outcomes {
            if outcome.is_success() {
                report.compiled.push(id);
            } else {
                report.failed.push(id);
            }
        }
        report.compiled.sort();
        report.failed.sort();

        tracing::debug!(
            "pass for {}: {} compiled, {} failed, {} collected",
            doc.path().display(),
            report.compiled.len(),
            report.failed.len(),
            report.collected.len()
        );
        Ok(report)
    }

    /// Stop tracking the fragment behind a target whose viewer went away.
    pub fn forget_target(&mut self, target: &Path) -> bool {
        let Some(entry) = self.fragments.take(target) else {
            return false;
        };

        match self
            .store
            .get_mut(&entry.document)
            .and_then(|s| s.remove(entry.fragment))
        {
            Some(fragment) => {
                tracing::debug!("{} released, viewer closed", fragment.id);
                self.fragments.release(&[fragment]);
                true
            }
            None => false,
        }
    }

    /// Tear down the session of `document`.
    pub fn close(&mut self, document: &Path) -> Result<Vec<PathBuf>> {
        let targets = self.store.close(document)?;
        self.fragments.forget(document);
        Ok(targets)
    }
}

/// Refresh the viewers of successfully compiled fragments, except `skip`.
fn refresh_compiled(
    session: &Session,
    viewer: &dyn Viewer,
    outcomes: &[(FragmentId, CompileOutcome)],
    skip: Option<FragmentId>,
) {
    for (id, outcome) in outcomes {
        if !outcome.is_success() || Some(*id) == skip {
            continue;
        }
        if let Some(fragment) = session.get(*id)
            && viewer.has_active_viewer(&fragment.artifact.target)
        {
            viewer.refresh(&fragment.artifact.target);
        }
    }
}
