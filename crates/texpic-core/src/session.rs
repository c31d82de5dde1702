//! Preview sessions and the fragments they own.
//!
//! Scratch layout for one process:
//!
//! ```text
//! $TMPDIR/texpic-XXXXXX/          # SessionStore root, removed on drop
//! ├── figures-0/                  # one directory per session
//! │   ├── preamble.tex            # synthesized preamble
//! │   ├── preamble.fmt            # precompiled format
//! │   ├── fragment-<uuid>.tex     # wrapped fragment source
//! │   └── fragment-<uuid>.pdf     # compiled artifact (viewer target)
//! └── thesis-1/
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};
use tempfile::TempDir;
use uuid::Uuid;

use crate::debounce::Debouncer;
use crate::document::Range;
use crate::error::{Error, Result};

/// Extensions of the byproducts a compile leaves next to a fragment source.
const ARTIFACT_EXTENSIONS: &[&str] = &["tex", "pdf", "log", "aux"];

/// Identifier of a fragment within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(pub(crate) u64);

impl FragmentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fragment_{}", self.0)
    }
}

/// Files backing one fragment's compiled preview.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHandle {
    /// Wrapped source handed to the compiler.
    pub source: PathBuf,
    /// Compiled output shown by the viewer.
    pub target: PathBuf,
}

impl ArtifactHandle {
    /// Allocate a fresh, unique handle inside `dir`.
    pub fn allocate(dir: &Path) -> Self {
        let stem = format!("fragment-{}", Uuid::new_v4().simple());
        Self {
            source: dir.join(format!("{}.tex", stem)),
            target: dir.join(format!("{}.pdf", stem)),
        }
    }

    /// Delete the source, the target and compiler byproducts.
    pub fn release(&self) {
        for ext in ARTIFACT_EXTENSIONS {
            let path = self.source.with_extension(ext);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::debug!("could not remove {}: {}", path.display(), e),
            }
        }
    }
}

/// A tracked picture region of a live document.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: FragmentId,
    /// Half-open range covering `\begin{..}` through `\end{..}`.
    pub bounds: Range,
    /// Text last read from `bounds`.
    pub content: String,
    pub artifact: ArtifactHandle,
    /// Last content change.
    pub last_activity: Instant,
}

/// Per-document preview state.
#[derive(Debug)]
pub struct Session {
    document: PathBuf,
    work_dir: PathBuf,
    fragments: Vec<Fragment>,
    /// Last committed preamble; empty until the first refresh.
    pub preamble: String,
    /// Fragments queued for the next recompilation pass.
    pub pending: FxHashSet<FragmentId>,
    /// Last recorded edit batch.
    pub last_activity: Instant,
    pub debouncer: Debouncer,
    next_id: u64,
}

impl Session {
    fn new(document: PathBuf, work_dir: PathBuf, delay: Duration) -> Self {
        Self {
            document,
            work_dir,
            fragments: Vec::new(),
            preamble: String::new(),
            pending: FxHashSet::default(),
            last_activity: Instant::now(),
            debouncer: Debouncer::new(delay),
            next_id: 0,
        }
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    /// Scratch directory, created on first use.
    pub fn work_dir(&self) -> Result<&Path> {
        if !self.work_dir.exists() {
            fs::create_dir_all(&self.work_dir)?;
            tracing::debug!("created scratch directory {}", self.work_dir.display());
        }
        Ok(&self.work_dir)
    }

    pub fn preamble_source(&self) -> PathBuf {
        self.work_dir.join("preamble.tex")
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragments_mut(&mut self) -> &mut [Fragment] {
        &mut self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn get(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: FragmentId) -> Option<&mut Fragment> {
        self.fragments.iter_mut().find(|f| f.id == id)
    }

    /// Fragment whose bounds equal `range` exactly.
    pub fn find_by_bounds(&self, range: Range) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.bounds == range)
    }

    /// Start tracking a new fragment.
    pub fn insert(&mut self, bounds: Range, content: String) -> Result<&Fragment> {
        let artifact = ArtifactHandle::allocate(self.work_dir()?);
        let id = FragmentId(self.next_id);
        self.next_id += 1;

        self.fragments.push(Fragment {
            id,
            bounds,
            content,
            artifact,
            last_activity: Instant::now(),
        });
        tracing::debug!("tracking {} at {} in {}", id, bounds, self.document.display());

        let idx = self.fragments.len() - 1;
        Ok(&self.fragments[idx])
    }

    /// Stop tracking a fragment. The caller decides whether to release it.
    pub fn remove(&mut self, id: FragmentId) -> Option<Fragment> {
        let idx = self.fragments.iter().position(|f| f.id == id)?;
        self.pending.remove(&id);
        Some(self.fragments.remove(idx))
    }

    /// Remove every fragment matching `pred`, returning them.
    pub fn drain_where(&mut self, mut pred: impl FnMut(&Fragment) -> bool) -> Vec<Fragment> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.fragments).into_iter().partition(|f| pred(f));
        self.fragments = kept;
        for fragment in &removed {
            self.pending.remove(&fragment.id);
        }
        removed
    }

    /// Release every artifact and delete the scratch directory.
    fn teardown(self) {
        for fragment in &self.fragments {
            fragment.artifact.release();
        }
        if self.work_dir.exists()
            && let Err(e) = fs::remove_dir_all(&self.work_dir)
        {
            tracing::debug!("could not remove {}: {}", self.work_dir.display(), e);
        }
    }
}

/// Owner of all preview sessions of a process.
///
/// Sessions are created on first use and destroyed by [`SessionStore::close`];
/// dropping the store removes the scratch root.
pub struct SessionStore {
    root: TempDir,
    delay: Duration,
    sessions: FxHashMap<PathBuf, Session>,
    created: u64,
}

impl SessionStore {
    /// Create a store with a fresh scratch root under the system temp dir.
    pub fn new(delay: Duration) -> Result<Self> {
        let root = tempfile::Builder::new().prefix("texpic-").tempdir()?;
        Ok(Self::with_root(root, delay))
    }

    /// Create a store using an existing scratch root.
    pub fn with_root(root: TempDir, delay: Duration) -> Self {
        Self {
            root,
            delay,
            sessions: FxHashMap::default(),
            created: 0,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn get(&self, document: &Path) -> Option<&Session> {
        self.sessions.get(document)
    }

    pub fn get_mut(&mut self, document: &Path) -> Option<&mut Session> {
        self.sessions.get_mut(document)
    }

    /// Session for `document`, creating it on first use.
    pub fn get_or_create(&mut self, document: &Path) -> &mut Session {
        let root = self.root.path();
        let delay = self.delay;
        let created = &mut self.created;

        self.sessions
            .entry(document.to_path_buf())
            .or_insert_with(|| {
                let stem = document
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string());
                let work_dir = root.join(format!("{}-{}", stem, created));
                *created += 1;

                tracing::debug!("opening session for {}", document.display());
                Session::new(document.to_path_buf(), work_dir, delay)
            })
    }

    /// Tear down a session, returning the viewer targets it owned.
    pub fn close(&mut self, document: &Path) -> Result<Vec<PathBuf>> {
        let session = self
            .sessions
            .remove(document)
            .ok_or_else(|| Error::SessionNotFound(document.to_path_buf()))?;

        let targets = session
            .fragments
            .iter()
            .map(|f| f.artifact.target.clone())
            .collect();
        tracing::debug!("closing session for {}", document.display());
        session.teardown();
        Ok(targets)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Path> {
        self.sessions.keys().map(PathBuf::as_path)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
