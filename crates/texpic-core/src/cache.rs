//! Fragment cache and viewer gate.
//!
//! Maps viewer targets back to the fragments that produce them and drops
//! fragments nobody is looking at.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::document::{Document, Range};
use crate::error::{Error, Result};
use crate::session::{ArtifactHandle, Fragment, FragmentId, Session};
use crate::viewer::Viewer;

/// Owner of a viewer target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    pub document: PathBuf,
    pub fragment: FragmentId,
}

/// Fragment a view request resolved to.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub id: FragmentId,
    pub artifact: ArtifactHandle,
    /// Whether the fragment was created by this request.
    pub created: bool,
}

/// Index of viewer targets. Does not own the fragments.
#[derive(Debug, Default)]
pub struct FragmentCache {
    targets: FxHashMap<PathBuf, TargetEntry>,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment for `range`, reusing one with identical bounds.
    pub fn resolve(&mut self, session: &mut Session, doc: &dyn Document, range: Range) -> Result<Resolved> {
        if !doc.is_valid(range) {
            return Err(Error::InvalidRange(range));
        }

        if let Some(existing) = session.find_by_bounds(range) {
            return Ok(Resolved {
                id: existing.id,
                artifact: existing.artifact.clone(),
                created: false,
            });
        }

        let document = session.document().to_path_buf();
        let fragment = session.insert(range, doc.text_in(range))?;
        self.targets.insert(
            fragment.artifact.target.clone(),
            TargetEntry {
                document,
                fragment: fragment.id,
            },
        );

        Ok(Resolved {
            id: fragment.id,
            artifact: fragment.artifact.clone(),
            created: true,
        })
    }

    /// Drop every fragment of `session` without an active viewer and release
    /// its artifact. Returns the dropped ids.
    pub fn gate(&mut self, session: &mut Session, viewer: &dyn Viewer) -> Vec<FragmentId> {
        let dropped = session.drain_where(|f| !viewer.has_active_viewer(&f.artifact.target));
        let ids = dropped.iter().map(|f| f.id).collect();

        for fragment in &dropped {
            tracing::debug!("{} has no viewer, dropping", fragment.id);
        }
        self.release(&dropped);
        ids
    }

    /// Unindex and release fragments already removed from their session.
    pub fn release(&mut self, fragments: &[Fragment]) {
        for fragment in fragments {
            self.targets.remove(&fragment.artifact.target);
            fragment.artifact.release();
        }
    }

    pub fn lookup(&self, target: &Path) -> Option<&TargetEntry> {
        self.targets.get(target)
    }

    /// Remove a target from the index, returning its owner.
    pub fn take(&mut self, target: &Path) -> Option<TargetEntry> {
        self.targets.remove(target)
    }

    /// Remove all targets of a document from the index.
    pub fn forget(&mut self, document: &Path) {
        self.targets.retain(|_, entry| entry.document != document);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
