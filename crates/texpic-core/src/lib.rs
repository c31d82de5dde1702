//! Core engine for live TikZ picture previews.
//!
//! This crate provides:
//! - Fragment region tracking across coordinate-based text edits
//! - Preamble extraction and change-driven precompilation
//! - A viewer-gated fragment cache
//! - Debounced recompilation passes and an async service loop

pub mod cache;
pub mod compile;
pub mod config;
pub mod debounce;
pub mod document;
pub mod error;
pub mod preamble;
pub mod previewer;
pub mod region;
pub mod service;
pub mod session;
pub mod viewer;

pub use cache::{FragmentCache, Resolved, TargetEntry};
pub use compile::{CompileOutcome, Compiler, LatexToolchain, Precompiler};
pub use config::PreviewConfig;
pub use debounce::Debouncer;
pub use document::{Bias, Document, Position, Range, TextDocument, TextEdit, diff_edit};
pub use error::{Error, Result};
pub use preamble::{ExtractOptions, PreambleCache, PreambleStatus, Scope};
pub use previewer::{PassOutcome, PassReport, Previewer};
pub use region::{Effect, EditOutcome, locate};
pub use service::{PreviewEvent, PreviewHandle, PreviewService};
pub use session::{ArtifactHandle, Fragment, FragmentId, Session, SessionStore};
pub use viewer::{Viewer, ViewerRegistry, ViewerUpdate};
