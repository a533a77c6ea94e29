//! Candidate expression under the cursor.
//!
//! This is a lexical heuristic, not a Python lexer: triple quoted strings, strings
//! spanning lines and f-string interpolation are not understood.

use once_cell::sync::Lazy;
use regex::Regex;

/// Zero-based position in a document, `character` counts unicode scalar values.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-width range.
    pub fn caret(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Dotted identifier chain, e.g. `self.cloud.points`.
static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*").expect("must compile")
});

/// Extract the expression at `range` in `text`.
///
/// A zero-width range selects the word under (or directly before) the cursor, a single
/// line selection is taken verbatim. Nothing is returned inside comments and inside
/// string literals.
pub fn extract_expression(text: &str, range: Range) -> Option<String> {
    let line = text.lines().nth(range.start.line)?;

    let (start, expression) = if range.is_empty() {
        word_at(line, byte_offset(line, range.start.character))?
    } else {
        selection(line, range)?
    };

    if in_comment(line, start) || in_string(line, start) {
        return None;
    }
    Some(expression)
}

fn byte_offset(line: &str, character: usize) -> usize {
    line.char_indices()
        .nth(character)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}

fn word_at(line: &str, at: usize) -> Option<(usize, String)> {
    WORD_RE
        .find_iter(line)
        .find(|m| m.start() <= at && at <= m.end())
        .map(|m| (m.start(), m.as_str().to_string()))
}

fn selection(line: &str, range: Range) -> Option<(usize, String)> {
    if range.start.line != range.end.line {
        return None;
    }
    let (from, to) = if range.start.character <= range.end.character {
        (range.start.character, range.end.character)
    } else {
        (range.end.character, range.start.character)
    };
    let from = byte_offset(line, from);
    let to = byte_offset(line, to);
    let selected = &line[from..to];

    let trimmed = selected.trim_start();
    let start = from + (selected.len() - trimmed.len());
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    Some((start, trimmed.to_string()))
}

/// Characters of `s` that are not escaped by a backslash, with their byte offsets.
fn unescaped(s: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut escaped = false;
    s.char_indices().filter(move |&(_, c)| {
        if escaped {
            escaped = false;
            return false;
        }
        if c == '\\' {
            escaped = true;
            return false;
        }
        true
    })
}

fn in_comment(line: &str, start: usize) -> bool {
    unescaped(line)
        .find(|&(_, c)| c == '#')
        .is_some_and(|(comment, _)| start > comment)
}

fn in_string(line: &str, start: usize) -> bool {
    let quotes = unescaped(&line[..start])
        .filter(|&(_, c)| c == '\'' || c == '"')
        .count();
    quotes % 2 == 1
}
