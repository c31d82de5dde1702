//! Edit application for tracked fragments.
//!
//! Edits arrive as coordinate ranges, not structural diffs, so a fragment's
//! boundaries are re-derived from the surrounding markers whenever an edit
//! could have touched them. Plain translation is only used when the edit is
//! provably outside the fragment.

use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::document::{Bias, Document, Position, TextDocument, TextEdit};
use crate::error::Result;
use crate::session::{Fragment, FragmentId, Session};

use super::markers;

/// How a single edit affected a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Edit lies after the fragment.
    Unchanged,
    /// Edit lies before the fragment; bounds shifted, content kept.
    Translated,
    /// Edit overlaps the fragment; bounds re-derived, content re-read.
    Reanchored,
    /// Edit consumed the opening marker.
    Deleted,
}

/// Accumulated result of applying one or more edits to a session.
#[derive(Debug, Default)]
pub struct EditOutcome {
    /// Fragments whose content must be recompiled.
    pub changed: FxHashSet<FragmentId>,
    /// Fragments removed from the session; their artifacts are not yet released.
    pub deleted: Vec<Fragment>,
}

impl EditOutcome {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    fn merge(&mut self, other: EditOutcome) {
        self.changed.extend(other.changed);
        for fragment in &other.deleted {
            self.changed.remove(&fragment.id);
        }
        self.deleted.extend(other.deleted);
    }
}

/// Apply one edit to every fragment of `session`.
///
/// `doc` is the live document after the edit.
pub fn apply(session: &mut Session, doc: &dyn Document, edit: &TextEdit, now: Instant) -> EditOutcome {
    let mut outcome = EditOutcome::default();
    let mut doomed = Vec::new();

    for fragment in session.fragments_mut() {
        match apply_to_fragment(fragment, doc, edit, now) {
            Effect::Reanchored => {
                outcome.changed.insert(fragment.id);
            }
            Effect::Deleted => doomed.push(fragment.id),
            Effect::Unchanged | Effect::Translated => {}
        }
    }

    for id in doomed {
        if let Some(fragment) = session.remove(id) {
            tracing::debug!("{} deleted by edit at {}", id, edit.range);
            outcome.deleted.push(fragment);
        }
    }

    outcome
}

/// Apply a batch of edits to `doc` and to every fragment of `session`.
///
/// `doc` is the document before the batch. Each edit is applied to it and
/// then tracked against the text right after that edit, so marker searches
/// never see a later edit. An invalid edit rejects the whole batch and leaves
/// `doc` and `session` untouched.
pub fn apply_all(
    session: &mut Session,
    doc: &mut TextDocument,
    edits: &[TextEdit],
    now: Instant,
) -> Result<EditOutcome> {
    doc.clone().apply_all(edits)?;

    let mut outcome = EditOutcome::default();
    for edit in edits {
        doc.apply(edit)?;
        outcome.merge(apply(session, doc, edit, now));
    }
    Ok(outcome)
}

/// Apply one edit to one fragment.
pub fn apply_to_fragment(
    fragment: &mut Fragment,
    doc: &dyn Document,
    edit: &TextEdit,
    now: Instant,
) -> Effect {
    let bounds = fragment.bounds;
    let edit_start = edit.range.start;
    let edit_end = edit.range.end;

    if edit_start >= bounds.end {
        return Effect::Unchanged;
    }

    if edit_end <= bounds.start {
        fragment.bounds.start = bounds.start.translate(edit, Bias::Right);
        fragment.bounds.end = bounds.end.translate(edit, Bias::Right);
        return Effect::Translated;
    }

    if edit_start <= bounds.start
        && bounds.start < edit_end
        && !markers::contains_opening(&edit.text)
    {
        return Effect::Deleted;
    }

    let translated_end = bounds.end.translate(edit, Bias::Right);

    let start = if edit_start <= bounds.start {
        let search_from = Position::new(edit_start.line, 0);
        match markers::find_opening(doc, search_from, Some(translated_end)) {
            Some(found) => found.start,
            None => {
                tracing::debug!("{}: opening marker not found, keeping start", fragment.id);
                doc.clamp(bounds.start.translate(edit, Bias::Left))
            }
        }
    } else {
        bounds.start
    };

    let end = if edit_end >= bounds.end {
        match markers::find_closing(doc, start) {
            Some(found) => found.end,
            None => {
                tracing::debug!("{}: closing marker not found, keeping end", fragment.id);
                doc.clamp(translated_end)
            }
        }
    } else {
        translated_end
    };

    fragment.bounds.start = start;
    fragment.bounds.end = end.max(start);
    fragment.content = doc.text_in(fragment.bounds);
    fragment.last_activity = now;

    Effect::Reanchored
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::document::{Range, TextDocument};
    use crate::session::SessionStore;

    const DOC: &str = "\\documentclass{article}\n\
\\begin{document}\n\
Intro text.\n\
\\begin{tikzpicture}\n\
\\draw (0,0) -- (1,1);\n\
\\end{tikzpicture}\n\
Outro text.\n\
\\end{document}";

    /// Lines 3..=5, ending just past `\end{tikzpicture}`.
    fn picture() -> Range {
        Range::from_coords(3, 0, 5, 17)
    }

    struct Fixture {
        store: SessionStore,
        doc: TextDocument,
        id: FragmentId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut store = SessionStore::new(Duration::from_millis(10)).unwrap();
            let doc = TextDocument::new("/work/paper.tex", DOC);
            let session = store.get_or_create(doc.path());
            let id = session
                .insert(picture(), doc.text_in(picture()))
                .unwrap()
                .id;
            Self { store, doc, id }
        }

        fn edit(&mut self, edit: TextEdit) -> EditOutcome {
            self.doc.apply(&edit).unwrap();
            let session = self.store.get_or_create(Path::new("/work/paper.tex"));
            apply(session, &self.doc, &edit, Instant::now())
        }

        fn fragment(&self) -> Option<&Fragment> {
            self.store.get(Path::new("/work/paper.tex"))?.get(self.id)
        }
    }

    #[test]
    fn test_edit_after_fragment_is_noop() {
        let mut fx = Fixture::new();
        let before = fx.fragment().unwrap().clone();

        let outcome = fx.edit(TextEdit::insert(Position::new(6, 0), "more\nlines\n"));

        let after = fx.fragment().unwrap();
        assert!(outcome.is_empty());
        assert_eq!(after.bounds, before.bounds);
        assert_eq!(after.content, before.content);
        assert_eq!(after.last_activity, before.last_activity);
    }

    #[test]
    fn test_insert_right_after_closing_marker_is_noop() {
        let mut fx = Fixture::new();
        let outcome = fx.edit(TextEdit::insert(Position::new(5, 17), " % done"));

        assert!(outcome.is_empty());
        assert_eq!(fx.fragment().unwrap().bounds, picture());
    }

    #[test]
    fn test_edit_before_fragment_translates() {
        let mut fx = Fixture::new();
        let content = fx.fragment().unwrap().content.clone();

        let outcome = fx.edit(TextEdit::insert(Position::new(2, 0), "one\ntwo\n"));

        let fragment = fx.fragment().unwrap();
        assert!(outcome.is_empty());
        assert_eq!(fragment.bounds, Range::from_coords(5, 0, 7, 17));
        assert_eq!(fragment.content, content);
        assert_eq!(fx.doc.text_in(fragment.bounds), content);
    }

    #[test]
    fn test_deletion_before_fragment_translates_up() {
        let mut fx = Fixture::new();

        fx.edit(TextEdit::delete(Range::from_coords(1, 0, 3, 0)));

        let fragment = fx.fragment().unwrap();
        assert_eq!(fragment.bounds, Range::from_coords(1, 0, 3, 17));
        assert!(fragment.content.starts_with("\\begin{tikzpicture}"));
    }

    #[test]
    fn test_same_line_edit_before_fragment_shifts_columns() {
        let mut fx = Fixture::new();

        fx.edit(TextEdit::insert(Position::new(3, 0), "  "));

        let fragment = fx.fragment().unwrap();
        assert_eq!(fragment.bounds, Range::from_coords(3, 2, 5, 17));
        assert_eq!(fx.doc.text_in(fragment.bounds), fragment.content);
    }

    #[test]
    fn test_consuming_opening_marker_deletes() {
        let mut fx = Fixture::new();

        let outcome = fx.edit(TextEdit::delete(Range::from_coords(2, 0, 4, 0)));

        assert!(fx.fragment().is_none());
        assert_eq!(outcome.deleted.len(), 1);
        assert_eq!(outcome.deleted[0].id, fx.id);
        assert!(outcome.changed.is_empty());
    }

    #[test]
    fn test_replacing_whole_picture_reanchors() {
        let mut fx = Fixture::new();
        let replacement = "\\begin{tikzpicture}\n\\fill (0,0) circle (1);\n\\end{tikzpicture}";

        let outcome = fx.edit(TextEdit::new(picture(), replacement));

        let fragment = fx.fragment().unwrap();
        assert!(outcome.changed.contains(&fx.id));
        assert_eq!(fragment.bounds, Range::from_coords(3, 0, 5, 17));
        assert_eq!(fragment.content, replacement);
    }

    #[test]
    fn test_insert_inside_fragment_moves_end() {
        let mut fx = Fixture::new();

        let outcome = fx.edit(TextEdit::insert(Position::new(5, 0), "\\draw (1,0) -- (0,1);\n\\fill (0,0) circle (2pt);\n"));

        let fragment = fx.fragment().unwrap();
        let closing = markers::find_closing(&fx.doc, fragment.bounds.start).unwrap();
        assert!(outcome.changed.contains(&fx.id));
        assert_eq!(fragment.bounds.start, Position::new(3, 0));
        assert_eq!(fragment.bounds.end, closing.end);
        assert_eq!(fragment.bounds.end, Position::new(7, 17));
        assert!(fragment.content.contains("circle (2pt)"));
    }

    #[test]
    fn test_single_line_edit_inside_fragment() {
        let mut fx = Fixture::new();

        fx.edit(TextEdit::new(Range::from_coords(4, 15, 4, 20), "(5,5)"));

        let fragment = fx.fragment().unwrap();
        assert_eq!(fragment.bounds, picture());
        assert!(fragment.content.contains("(0,0) -- (5,5)"));
    }

    #[test]
    fn test_editing_closing_marker_reanchors_end() {
        let mut fx = Fixture::new();
        // Delete "\end{tikzpicture}" entirely: no closing marker remains.
        let outcome = fx.edit(TextEdit::delete(Range::from_coords(5, 0, 5, 17)));

        let fragment = fx.fragment().unwrap();
        assert!(outcome.changed.contains(&fx.id));
        assert_eq!(fragment.bounds.start, Position::new(3, 0));
        assert_eq!(fragment.bounds.end, Position::new(5, 0));
        assert_eq!(fx.doc.text_in(fragment.bounds), fragment.content);
    }

    #[test]
    fn test_retyping_closing_marker_extends_to_new_marker() {
        let mut fx = Fixture::new();

        fx.edit(TextEdit::new(
            Range::from_coords(5, 0, 5, 17),
            "\\node {x};\n\\end{tikzpicture}",
        ));

        let fragment = fx.fragment().unwrap();
        assert_eq!(fragment.bounds, Range::from_coords(3, 0, 6, 17));
        assert!(fragment.content.ends_with("\\node {x};\n\\end{tikzpicture}"));
    }

    #[test]
    fn test_edit_ending_at_opening_marker_translates() {
        let mut fx = Fixture::new();
        let content = fx.fragment().unwrap().content.clone();

        let outcome = fx.edit(TextEdit::delete(Range::from_coords(2, 0, 3, 0)));

        let fragment = fx.fragment().unwrap();
        assert!(outcome.is_empty());
        assert_eq!(fragment.bounds, Range::from_coords(2, 0, 4, 17));
        assert_eq!(fragment.content, content);
    }

    #[test]
    fn test_edit_inside_opening_marker_keeps_start() {
        let mut fx = Fixture::new();

        let outcome = fx.edit(TextEdit::delete(Range::from_coords(3, 3, 3, 8)));

        let fragment = fx.fragment().unwrap();
        assert!(outcome.changed.contains(&fx.id));
        assert_eq!(fragment.bounds, picture());
        assert!(fragment.content.starts_with("\\beikzpicture}"));
        assert_eq!(fx.doc.text_in(fragment.bounds), fragment.content);
    }

    #[test]
    fn test_shrinking_replacement_across_start_with_marker_reanchors() {
        let mut fx = Fixture::new();

        let outcome = fx.edit(TextEdit::new(
            Range::from_coords(2, 0, 4, 0),
            "\\begin{tikzpicture}[scale=2]\n",
        ));

        let fragment = fx.fragment().unwrap();
        assert!(outcome.changed.contains(&fx.id));
        assert_eq!(fragment.bounds, Range::from_coords(2, 0, 4, 17));
        assert!(fragment.content.starts_with("\\begin{tikzpicture}[scale=2]\n\\draw"));
        assert_eq!(fx.doc.text_in(fragment.bounds), fragment.content);
    }

    #[test]
    fn test_shrinking_replacement_across_start_without_marker_deletes() {
        let mut fx = Fixture::new();

        let outcome = fx.edit(TextEdit::new(Range::from_coords(2, 0, 4, 0), "Intro.\n"));

        assert!(fx.fragment().is_none());
        assert_eq!(outcome.deleted.len(), 1);
    }

    #[test]
    fn test_commented_out_marker_in_replacement_deletes() {
        let mut fx = Fixture::new();

        let outcome = fx.edit(TextEdit::new(
            Range::from_coords(3, 0, 3, 19),
            "% \\begin{tikzpicture}",
        ));

        assert!(fx.fragment().is_none());
        assert_eq!(outcome.deleted.len(), 1);
    }

    #[test]
    fn test_batch_tracks_each_edit_against_its_own_text() {
        let mut fx = Fixture::new();
        let edits = [
            TextEdit::new(
                Range::from_coords(5, 0, 5, 17),
                "\\node {x};\n\\end{tikzpicture}",
            ),
            TextEdit::insert(Position::new(0, 0), "% header\n"),
        ];

        let session = fx.store.get_or_create(Path::new("/work/paper.tex"));
        let outcome = apply_all(session, &mut fx.doc, &edits, Instant::now()).unwrap();

        let fragment = fx.fragment().unwrap();
        assert!(outcome.changed.contains(&fx.id));
        assert_eq!(fragment.bounds, Range::from_coords(4, 0, 7, 17));
        assert!(fragment.content.starts_with("\\begin{tikzpicture}"));
        assert!(fragment.content.ends_with("\\node {x};\n\\end{tikzpicture}"));
        assert_eq!(fx.doc.text_in(fragment.bounds), fragment.content);
    }

    #[test]
    fn test_batch_changed_then_deleted_is_only_deleted() {
        let mut fx = Fixture::new();
        let edits = [
            TextEdit::insert(Position::new(4, 0), "\\node {a};\n"),
            TextEdit::delete(Range::from_coords(3, 0, 4, 0)),
        ];

        let session = fx.store.get_or_create(Path::new("/work/paper.tex"));
        let outcome = apply_all(session, &mut fx.doc, &edits, Instant::now()).unwrap();

        assert!(outcome.changed.is_empty());
        assert_eq!(outcome.deleted.len(), 1);
        assert!(session.is_empty());
    }

    #[test]
    fn test_invalid_batch_leaves_session_and_text_untouched() {
        let mut fx = Fixture::new();
        let edits = [
            TextEdit::insert(Position::new(0, 0), "% header\n"),
            TextEdit::delete(Range::from_coords(40, 0, 41, 0)),
        ];

        let session = fx.store.get_or_create(Path::new("/work/paper.tex"));
        let err = apply_all(session, &mut fx.doc, &edits, Instant::now()).unwrap_err();

        assert!(matches!(err, crate::error::Error::InvalidRange(_)));
        assert_eq!(fx.doc.text(), DOC);
        assert_eq!(fx.fragment().unwrap().bounds, picture());
    }
}
