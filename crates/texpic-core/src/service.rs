//! Async event loop around a [`Previewer`].
//!
//! Host events arrive over an unbounded channel and are applied strictly in
//! order. Between events the loop sleeps until the earliest debounce
//! deadline, then runs the due passes.
//!
//! An edit batch that does not fit the mirrored text is rejected whole. The
//! document is then out of sync with the host: further edits for it are
//! ignored and its path is sent on the resync channel until the host sends
//! the full text again with `Open` or `Replace`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::{mpsc, oneshot};

use crate::document::{Document, Range, TextDocument, TextEdit, diff_edit};
use crate::error::{Error, Result};
use crate::previewer::{PassOutcome, Previewer};
use crate::session::ArtifactHandle;

/// Input to the service.
#[derive(Debug)]
pub enum PreviewEvent {
    /// Start following a document with the given text.
    Open { path: PathBuf, text: String },
    /// Incremental edits, in order, against the current text.
    Edit { path: PathBuf, edits: Vec<TextEdit> },
    /// A whole new version of the text; diffed into a single edit.
    Replace { path: PathBuf, text: String },
    /// Compile and show the fragment at `range`.
    View {
        path: PathBuf,
        range: Range,
        reply: oneshot::Sender<Result<ArtifactHandle>>,
    },
    /// The viewer of a target was closed.
    ViewerClosed(PathBuf),
    /// Stop following a document and drop its session.
    Close(PathBuf),
}

pub struct PreviewService {
    previewer: Previewer,
    documents: FxHashMap<PathBuf, TextDocument>,
    /// Documents waiting for a full-text `Open` or `Replace`.
    stale: FxHashSet<PathBuf>,
    resync: Option<mpsc::UnboundedSender<PathBuf>>,
    rx: mpsc::UnboundedReceiver<PreviewEvent>,
}

impl PreviewService {
    pub fn new(previewer: Previewer) -> (Self, PreviewHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            previewer,
            documents: FxHashMap::default(),
            stale: FxHashSet::default(),
            resync: None,
            rx,
        };
        (service, PreviewHandle { tx })
    }

    /// Report documents that need their full text resent on `tx`.
    pub fn with_resync(mut self, tx: mpsc::UnboundedSender<PathBuf>) -> Self {
        self.resync = Some(tx);
        self
    }

    /// Process events until every handle is dropped, then hand the previewer
    /// back.
    pub async fn run(mut self) -> Previewer {
        loop {
            let deadline = self.previewer.next_deadline();

            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                _ = sleep_until(deadline) => self.fire(Instant::now()),
            }
        }

        tracing::debug!("preview service stopped");
        self.previewer
    }

    fn handle(&mut self, event: PreviewEvent) {
        match event {
            PreviewEvent::Open { path, text } => {
                self.stale.remove(&path);
                let doc = TextDocument::new(path.clone(), &text);
                self.documents.insert(path, doc);
            }
            PreviewEvent::Edit { path, edits } => {
                if self.stale.contains(&path) {
                    tracing::debug!("ignoring edit for out of sync {}", path.display());
                    return;
                }
                let Some(doc) = self.documents.get_mut(&path) else {
                    tracing::debug!("edit for unknown document {}", path.display());
                    return;
                };

                if let Err(e) = self.previewer.on_edit(doc, &edits, Instant::now()) {
                    tracing::warn!("{}: {}, waiting for full text", path.display(), e);
                    self.request_resync(path);
                }
            }
            PreviewEvent::Replace { path, text } => {
                self.stale.remove(&path);
                let Some(doc) = self.documents.get_mut(&path) else {
                    self.documents
                        .insert(path.clone(), TextDocument::new(path, &text));
                    return;
                };

                if let Some(edit) = diff_edit(&doc.text(), &text)
                    && let Err(e) = self.previewer.on_edit(doc, &[edit], Instant::now())
                {
                    tracing::warn!("{}: {}", path.display(), e);
                    doc.set_text(&text);
                }
            }
            PreviewEvent::View { path, range, reply } => {
                let result = self.view(&path, range);
                if reply.send(result).is_err() {
                    tracing::debug!("view requester for {} went away", path.display());
                }
            }
            PreviewEvent::ViewerClosed(target) => {
                self.previewer.forget_target(&target);
            }
            PreviewEvent::Close(path) => {
                self.documents.remove(&path);
                self.stale.remove(&path);
                if let Err(e) = self.previewer.close(&path) {
                    tracing::debug!("{}", e);
                }
            }
        }
    }

    fn request_resync(&mut self, path: PathBuf) {
        if let Some(tx) = &self.resync
            && tx.send(path.clone()).is_err()
        {
            tracing::debug!("resync receiver went away");
        }
        self.stale.insert(path);
    }

    fn view(&mut self, path: &Path, range: Range) -> Result<ArtifactHandle> {
        if !self.documents.contains_key(path) {
            let doc = TextDocument::load(path)?;
            self.documents.insert(path.to_path_buf(), doc);
        }
        let doc = self
            .documents
            .get(path)
            .ok_or_else(|| Error::SessionNotFound(path.to_path_buf()))?;

        self.previewer.view(doc, range)
    }

    fn fire(&mut self, now: Instant) {
        for path in self.previewer.due(now) {
            let Some(doc) = self.documents.get(&path) else {
                self.previewer.cancel_pending(&path);
                continue;
            };

            match self.previewer.poll(doc, now) {
                Ok(Some(PassOutcome::Ran(report))) => {
                    if !report.failed.is_empty() {
                        tracing::warn!(
                            "{} of {} fragments failed to compile in {}",
                            report.failed.len(),
                            report.failed.len() + report.compiled.len(),
                            path.display()
                        );
                    }
                }
                Ok(Some(PassOutcome::Dropped { .. })) | Ok(None) => {}
                Err(e) => tracing::error!("{}: {}", path.display(), e),
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending::<()>().await,
    }
}

/// Cloneable sender side of a [`PreviewService`].
#[derive(Debug, Clone)]
pub struct PreviewHandle {
    tx: mpsc::UnboundedSender<PreviewEvent>,
}

impl PreviewHandle {
    pub fn send(&self, event: PreviewEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::ServiceStopped)
    }

    pub fn open(&self, path: impl Into<PathBuf>, text: impl Into<String>) -> Result<()> {
        self.send(PreviewEvent::Open {
            path: path.into(),
            text: text.into(),
        })
    }

    pub fn edit(&self, path: impl Into<PathBuf>, edits: Vec<TextEdit>) -> Result<()> {
        self.send(PreviewEvent::Edit {
            path: path.into(),
            edits,
        })
    }

    pub fn replace(&self, path: impl Into<PathBuf>, text: impl Into<String>) -> Result<()> {
        self.send(PreviewEvent::Replace {
            path: path.into(),
            text: text.into(),
        })
    }

    /// Request a view and wait for the compile to finish.
    pub async fn view(&self, path: impl Into<PathBuf>, range: Range) -> Result<ArtifactHandle> {
        let (reply, rx) = oneshot::channel();
        self.send(PreviewEvent::View {
            path: path.into(),
            range,
            reply,
        })?;
        rx.await.map_err(|_| Error::ServiceStopped)?
    }

    pub fn viewer_closed(&self, target: impl Into<PathBuf>) -> Result<()> {
        self.send(PreviewEvent::ViewerClosed(target.into()))
    }

    pub fn close(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.send(PreviewEvent::Close(path.into()))
    }
}
