//! Text utilities shared by the annotator, renderer and tree.
//!
//! This module provides three families of helpers:
//!
//! - **Position conversion**: byte offsets <-> [`Position`] (0-indexed, columns
//!   count Unicode scalar values)
//! - **Names**: base names of paths and display names of qualified identifiers
//! - **Escaping**: HTML escaping for the renderer

use crate::position::Position;

// ============================================================================
// Position Conversion
// ============================================================================

/// Convert a byte offset to a [`Position`].
///
/// If `offset` exceeds the text length, returns the position at end of text.
/// An offset inside a multi-byte character resolves to that character.
pub fn offset_to_position(text: &str, offset: usize) -> Position {
    let mut pos = Position::origin();
    for (i, ch) in text.char_indices() {
        if i >= offset {
            break;
        }
        if i + ch.len_utf8() > offset {
            break;
        }
        pos.advance(ch);
    }
    pos
}

/// Convert a [`Position`] to a byte offset.
///
/// Returns `None` when the position does not address a character of `text` or
/// the end of text. A column one past the last character of a line addresses
/// that line's `\n`.
pub fn position_to_offset(text: &str, target: Position) -> Option<usize> {
    let mut pos = Position::origin();
    for (i, ch) in text.char_indices() {
        if pos == target {
            return Some(i);
        }
        if pos.line > target.line {
            return None;
        }
        pos.advance(ch);
    }
    (pos == target).then_some(text.len())
}

/// Count the number of lines in the text.
///
/// A trailing newline does not start a new line.
pub fn line_count(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let newlines = text.bytes().filter(|&b| b == b'\n').count();
    if text.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

// ============================================================================
// Names
// ============================================================================

/// Last component of a `/`-separated path, ignoring a trailing `/`.
///
/// `"/a/b/"` and `"/a/b"` both yield `"b"`; `"/"` yields `""`.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Drop the package qualifier of a type name: `"java.util.List"` -> `"List"`.
pub fn simple_name(qualified: &str) -> &str {
    match qualified.rfind('.') {
        Some(pos) => &qualified[pos + 1..],
        None => qualified,
    }
}

/// Drop package and class of a member name: `"a.B#run"` -> `"run"`.
pub fn member_name(qualified: &str) -> &str {
    match qualified.rfind('#') {
        Some(pos) => &qualified[pos + 1..],
        None => qualified,
    }
}

/// Human-readable name of a method, translating JVM special names.
pub fn method_display_name(qualified: &str) -> &str {
    match member_name(qualified) {
        "<init>" => "constructor",
        "<clinit>" | "<cinit>" => "static-block",
        name => name,
    }
}

// ============================================================================
// Escaping
// ============================================================================

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
