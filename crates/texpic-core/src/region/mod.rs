//! Fragment boundary tracking.
//!
//! # Architecture
//!
//! ```text
//! TextEdit ──► tracker::apply ──┬── after fragment   ──► unchanged
//!                               ├── before fragment  ──► translate bounds
//!                               ├── opening consumed ──► delete
//!                               └── overlap          ──► re-anchor via markers
//! ```

pub mod markers;
mod tracker;

pub use markers::strip_comment;
pub use tracker::{Effect, EditOutcome, apply, apply_all, apply_to_fragment};

use crate::document::{Document, Position, Range};

/// Range of the picture enclosing `at`, from its opening marker through
/// the end of its closing marker.
pub fn locate(doc: &dyn Document, at: Position) -> Option<Range> {
    let opening = markers::find_opening_before(doc, at)?;
    let closing = markers::find_closing(doc, opening.end)?;
    let range = Range::new(opening.start, closing.end);

    (at <= range.end).then_some(range)
}
