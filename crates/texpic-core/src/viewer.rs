//! Viewer collaborator boundary.
//!
//! The core never renders anything itself. It asks the viewer whether a
//! target is on screen and tells it when a target should be refreshed or
//! opened.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rustc_hash::FxHashSet;

/// Display surface for compiled artifacts.
pub trait Viewer: Send + Sync {
    /// Whether `target` currently has at least one active viewer.
    fn has_active_viewer(&self, target: &Path) -> bool;

    /// Reload an already displayed target in place.
    fn refresh(&self, target: &Path);

    /// Display a target that has no viewer yet.
    fn open(&self, target: &Path, focus: bool);
}

/// Notification emitted by [`ViewerRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerUpdate {
    Opened { focus: bool },
    Refreshed,
}

type UpdateCallback = Box<dyn Fn(&Path, ViewerUpdate) + Send + Sync>;

/// In-process viewer that tracks open targets and forwards updates to a
/// callback.
#[derive(Default)]
pub struct ViewerRegistry {
    open: Mutex<FxHashSet<PathBuf>>,
    callback: Option<UpdateCallback>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that reports every open and refresh to `callback`.
    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(&Path, ViewerUpdate) + Send + Sync + 'static,
    {
        Self {
            open: Mutex::default(),
            callback: Some(Box::new(callback)),
        }
    }

    /// Mark a target as no longer viewed. Returns whether it was open.
    pub fn close(&self, target: &Path) -> bool {
        self.targets().remove(target)
    }

    pub fn is_open(&self, target: &Path) -> bool {
        self.targets().contains(target)
    }

    pub fn len(&self) -> usize {
        self.targets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets().is_empty()
    }

    fn targets(&self) -> std::sync::MutexGuard<'_, FxHashSet<PathBuf>> {
        self.open.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, target: &Path, update: ViewerUpdate) {
        if let Some(callback) = &self.callback {
            callback(target, update);
        }
    }
}

impl Viewer for ViewerRegistry {
    fn has_active_viewer(&self, target: &Path) -> bool {
        self.is_open(target)
    }

    fn refresh(&self, target: &Path) {
        if self.is_open(target) {
            self.notify(target, ViewerUpdate::Refreshed);
        }
    }

    fn open(&self, target: &Path, focus: bool) {
        self.targets().insert(target.to_path_buf());
        self.notify(target, ViewerUpdate::Opened { focus });
    }
}
