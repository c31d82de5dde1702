//! Opening and closing marker search.
//!
//! Markers are matched with regular expressions on comment-stripped lines.
//! This is a heuristic, not a parser: nesting is ignored and the first match
//! wins. Callers must handle a miss.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Document, Position, Range};

static OPENING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\s*\{tikzpicture\}").unwrap());

static CLOSING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\end\s*\{tikzpicture\}").unwrap());

/// Cut `line` at its first unescaped `%`.
///
/// A backslash escapes the character after it, so `\%` is literal while
/// `\\%` starts a comment.
pub fn strip_comment(line: &str) -> &str {
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '%' => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Whether `text` contains an opening marker outside comments.
pub fn contains_opening(text: &str) -> bool {
    text.lines().any(|line| OPENING.is_match(strip_comment(line)))
}

/// First opening marker at or after `from`, starting before `limit`.
pub fn find_opening(doc: &dyn Document, from: Position, limit: Option<Position>) -> Option<Range> {
    find_forward(doc, &OPENING, from).filter(|m| limit.is_none_or(|limit| m.start < limit))
}

/// First closing marker at or after `from`.
pub fn find_closing(doc: &dyn Document, from: Position) -> Option<Range> {
    find_forward(doc, &CLOSING, from)
}

/// Last opening marker starting at or before `at`.
pub fn find_opening_before(doc: &dyn Document, at: Position) -> Option<Range> {
    let at = doc.clamp(at);
    (0..=at.line).rev().find_map(|n| {
        let line = strip_comment(doc.line(n)?);
        OPENING
            .find_iter(line)
            .map(|m| match_range(line, n, m.start(), m.end()))
            .filter(|r| r.start <= at)
            .last()
    })
}

fn find_forward(doc: &dyn Document, pattern: &Regex, from: Position) -> Option<Range> {
    let from = doc.clamp(from);
    (from.line..doc.line_count()).find_map(|n| {
        let line = strip_comment(doc.line(n)?);
        let offset = if n == from.line {
            crate::document::byte_offset(line, from.character)
        } else {
            0
        };
        pattern
            .find_at(line, offset)
            .map(|m| match_range(line, n, m.start(), m.end()))
    })
}

fn match_range(line: &str, n: u32, start: usize, end: usize) -> Range {
    let start_char = line[..start].chars().count() as u32;
    let end_char = start_char + line[start..end].chars().count() as u32;
    Range::from_coords(n, start_char, n, end_char)
}
