//! Live document abstraction.
//!
//! Positions are `(line, character)` pairs, both zero based. `character`
//! counts Unicode scalar values, not bytes. Ranges are half-open.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A location in a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    /// Map this position from the pre-edit document into the post-edit one.
    ///
    /// Positions inside the replaced range collapse to the edit start
    /// ([`Bias::Left`]) or to the end of the inserted text ([`Bias::Right`]).
    pub fn translate(self, edit: &TextEdit, bias: Bias) -> Self {
        if self < edit.range.start {
            return self;
        }

        if self < edit.range.end {
            return match bias {
                Bias::Left => edit.range.start,
                Bias::Right => edit.new_end(),
            };
        }

        if self.line == edit.range.end.line {
            let new_end = edit.new_end();
            return Self::new(
                new_end.line,
                new_end.character + (self.character - edit.range.end.character),
            );
        }

        let line = i64::from(self.line) + edit.line_delta();
        Self::new(line.max(0) as u32, self.character)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// Where a position inside a replaced range lands after the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Left,
    Right,
}

/// Half-open range `[start, end)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Shorthand for `Range::new(Position::new(..), Position::new(..))`.
    pub fn from_coords(start_line: u32, start_char: u32, end_line: u32, end_char: u32) -> Self {
        Self::new(
            Position::new(start_line, start_char),
            Position::new(end_line, end_char),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos < self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A single replacement: `range` of the pre-edit document becomes `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: Range,
    pub text: String,
}

impl TextEdit {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        Self::new(Range::new(at, at), text)
    }

    pub fn delete(range: Range) -> Self {
        Self::new(range, String::new())
    }

    /// Lines added by the replacement minus lines removed by the range.
    pub fn line_delta(&self) -> i64 {
        let inserted = self.text.matches('\n').count() as i64;
        let removed = i64::from(self.range.end.line - self.range.start.line);
        inserted - removed
    }

    /// End of the inserted text in the post-edit document.
    pub fn new_end(&self) -> Position {
        match self.text.rfind('\n') {
            Some(idx) => Position::new(
                self.range.start.line + self.text.matches('\n').count() as u32,
                self.text[idx + 1..].chars().count() as u32,
            ),
            None => Position::new(
                self.range.start.line,
                self.range.start.character + self.text.chars().count() as u32,
            ),
        }
    }
}

/// Read access to a live document.
///
/// Implementors supply line lookups; the remaining operations are derived.
pub trait Document {
    /// Stable identity of the document.
    fn path(&self) -> &Path;

    /// Number of lines, always at least one.
    fn line_count(&self) -> u32;

    /// Line `n` without its terminator.
    fn line(&self, n: u32) -> Option<&str>;

    /// Full document text.
    fn text(&self) -> String {
        (0..self.line_count())
            .filter_map(|n| self.line(n))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Position just past the last character.
    fn end(&self) -> Position {
        let last = self.line_count().saturating_sub(1);
        let len = self.line(last).map(|l| l.chars().count()).unwrap_or(0);
        Position::new(last, len as u32)
    }

    /// Clamp `pos` to the nearest valid position.
    fn clamp(&self, pos: Position) -> Position {
        let end = self.end();
        if pos.line > end.line {
            return end;
        }
        let len = self.line(pos.line).map(|l| l.chars().count()).unwrap_or(0) as u32;
        Position::new(pos.line, pos.character.min(len))
    }

    /// Text covered by `range`, clamped to the document.
    fn text_in(&self, range: Range) -> String {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end);
        if end <= start {
            return String::new();
        }

        let mut out = String::new();
        for n in start.line..=end.line {
            let line = self.line(n).unwrap_or("");
            let from = if n == start.line { start.character } else { 0 };
            let to = if n == end.line {
                end.character as usize
            } else {
                usize::MAX
            };
            out.extend(line.chars().skip(from as usize).take(to.saturating_sub(from as usize)));
            if n != end.line {
                out.push('\n');
            }
        }
        out
    }

    /// Whether `range` is ordered and lies within the document.
    fn is_valid(&self, range: Range) -> bool {
        range.start <= range.end && self.clamp(range.start) == range.start && self.clamp(range.end) == range.end
    }
}

/// Owned, editable document text.
#[derive(Debug, Clone)]
pub struct TextDocument {
    path: PathBuf,
    lines: Vec<String>,
}

impl TextDocument {
    pub fn new(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    /// Load a document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path, &text))
    }

    /// Apply an edit expressed against the current text.
    pub fn apply(&mut self, edit: &TextEdit) -> Result<()> {
        if !self.is_valid(edit.range) {
            return Err(Error::InvalidRange(edit.range));
        }

        let start = edit.range.start;
        let end = edit.range.end;
        let head = &self.lines[start.line as usize];
        let head = &head[..byte_offset(head, start.character)];
        let tail = &self.lines[end.line as usize];
        let tail = &tail[byte_offset(tail, end.character)..];

        let replaced = format!("{}{}{}", head, edit.text, tail);
        let new_lines: Vec<String> = replaced.split('\n').map(str::to_string).collect();
        self.lines
            .splice(start.line as usize..=end.line as usize, new_lines);
        Ok(())
    }

    /// Apply edits in order. An invalid edit leaves the text untouched.
    pub fn apply_all(&mut self, edits: &[TextEdit]) -> Result<()> {
        let mut lines = self.lines.clone();
        for edit in edits {
            if let Err(e) = self.apply(edit) {
                std::mem::swap(&mut self.lines, &mut lines);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Replace the whole text.
    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
    }
}

impl Document for TextDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    fn line(&self, n: u32) -> Option<&str> {
        self.lines.get(n as usize).map(String::as_str)
    }
}

/// Byte offset of the `character`-th scalar value, or the line length.
pub(crate) fn byte_offset(line: &str, character: u32) -> usize {
    line.char_indices()
        .nth(character as usize)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}

/// Derive a single edit turning `old` into `new`.
///
/// The edit spans from the first differing character to the last one, so a
/// file watcher that only sees whole versions can still feed the tracker.
pub fn diff_edit(old: &str, new: &str) -> Option<TextEdit> {
    if old == new {
        return None;
    }

    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let prefix = old_chars
        .iter()
        .zip(&new_chars)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old_chars[prefix..]
        .iter()
        .rev()
        .zip(new_chars[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let start = position_at(&old_chars, prefix);
    let end = position_at(&old_chars, old_chars.len() - suffix);
    let text: String = new_chars[prefix..new_chars.len() - suffix].iter().collect();

    Some(TextEdit::new(Range::new(start, end), text))
}

fn position_at(chars: &[char], offset: usize) -> Position {
    let mut pos = Position::default();
    for &c in &chars[..offset] {
        if c == '\n' {
            pos.line += 1;
            pos.character = 0;
        } else {
            pos.character += 1;
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> TextDocument {
        TextDocument::new("/tmp/doc.tex", text)
    }

    #[test]
    fn test_line_delta() {
        let insert = TextEdit::insert(Position::new(2, 0), "a\nb\n");
        assert_eq!(insert.line_delta(), 2);

        let delete = TextEdit::delete(Range::from_coords(1, 0, 4, 0));
        assert_eq!(delete.line_delta(), -3);

        let replace = TextEdit::new(Range::from_coords(1, 3, 2, 1), "x");
        assert_eq!(replace.line_delta(), -1);
    }

    #[test]
    fn test_new_end() {
        let edit = TextEdit::new(Range::from_coords(3, 4, 3, 6), "abc");
        assert_eq!(edit.new_end(), Position::new(3, 7));

        let edit = TextEdit::new(Range::from_coords(3, 4, 5, 0), "a\nbé");
        assert_eq!(edit.new_end(), Position::new(4, 2));
    }

    #[test]
    fn test_translate_positions() {
        let edit = TextEdit::new(Range::from_coords(2, 3, 2, 5), "hello\nworld");

        assert_eq!(Position::new(1, 9).translate(&edit, Bias::Left), Position::new(1, 9));
        assert_eq!(Position::new(2, 7).translate(&edit, Bias::Left), Position::new(3, 7));
        assert_eq!(Position::new(6, 2).translate(&edit, Bias::Left), Position::new(7, 2));
        assert_eq!(Position::new(2, 4).translate(&edit, Bias::Left), Position::new(2, 3));
        assert_eq!(Position::new(2, 4).translate(&edit, Bias::Right), Position::new(3, 5));
    }

    #[test]
    fn test_text_in() {
        let d = doc("first\nsecond line\nthird");
        assert_eq!(d.text_in(Range::from_coords(0, 1, 0, 4)), "irs");
        assert_eq!(d.text_in(Range::from_coords(0, 3, 2, 2)), "st\nsecond line\nth");
        assert_eq!(d.text_in(Range::from_coords(1, 0, 9, 0)), "second line\nthird");
        assert_eq!(d.text_in(Range::from_coords(2, 2, 1, 0)), "");
    }

    #[test]
    fn test_apply_edits() {
        let mut d = doc("alpha\nbeta\ngamma");

        d.apply(&TextEdit::insert(Position::new(1, 0), "new\n")).unwrap();
        assert_eq!(d.text(), "alpha\nnew\nbeta\ngamma");

        d.apply(&TextEdit::delete(Range::from_coords(0, 2, 2, 2))).unwrap();
        assert_eq!(d.text(), "alta\ngamma");

        d.apply(&TextEdit::new(Range::from_coords(1, 0, 1, 5), "délta")).unwrap();
        assert_eq!(d.text(), "alta\ndélta");
        assert_eq!(d.end(), Position::new(1, 5));
    }

    #[test]
    fn test_apply_rejects_out_of_range() {
        let mut d = doc("one\ntwo");
        let result = d.apply(&TextEdit::insert(Position::new(5, 0), "x"));
        assert!(matches!(result, Err(Error::InvalidRange(_))));

        let result = d.apply(&TextEdit::delete(Range::from_coords(1, 2, 0, 0)));
        assert!(matches!(result, Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_apply_all_rejects_batch_atomically() {
        let mut d = doc("one\ntwo");
        let edits = [
            TextEdit::insert(Position::new(0, 0), "zero\n"),
            TextEdit::insert(Position::new(9, 0), "x"),
        ];

        assert!(matches!(d.apply_all(&edits), Err(Error::InvalidRange(_))));
        assert_eq!(d.text(), "one\ntwo");

        d.apply_all(&edits[..1]).unwrap();
        assert_eq!(d.text(), "zero\none\ntwo");
    }

    #[test]
    fn test_diff_edit_round_trips() {
        let old = "a\nb\nc\nd";
        let new = "a\nb\nX\nY\nc\nd";

        let edit = diff_edit(old, new).unwrap();
        assert_eq!(edit.range, Range::from_coords(2, 0, 2, 0));
        assert_eq!(edit.text, "X\nY\n");

        let mut d = doc(old);
        d.apply(&edit).unwrap();
        assert_eq!(d.text(), new);

        assert!(diff_edit(old, old).is_none());
    }

    #[test]
    fn test_diff_edit_deletion() {
        let edit = diff_edit("keep\ndrop me\nkeep", "keep\nkeep").unwrap();

        let mut d = doc("keep\ndrop me\nkeep");
        d.apply(&edit).unwrap();
        assert_eq!(d.text(), "keep\nkeep");
        assert!(edit.text.is_empty());
    }
}
