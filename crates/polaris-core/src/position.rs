//! Line/column positions and half-open spans over source text.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **0-indexed** (matching the index backend's wire format)
//! - A column counts Unicode scalar values, not bytes
//! - After each `\n` the line increments and the column resets to 0
//!
//! Positions are ordered lexicographically by `(line, column)`, so comparing two
//! positions never needs the text they point into.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Position
// ============================================================================

/// A `(line, column)` location in a source text.
///
/// The derived ordering compares `line` first, then `column`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    /// Line number (0-indexed).
    pub line: u32,
    /// Column number (0-indexed, Unicode scalar values).
    pub column: u32,
}

impl Position {
    /// Create a position.
    pub const fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    /// The first position of any text.
    pub const fn origin() -> Self {
        Position { line: 0, column: 0 }
    }

    /// Advance past one character.
    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Total order over positions: line first, then column.
pub fn compare_positions(a: &Position, b: &Position) -> Ordering {
    a.line.cmp(&b.line).then(a.column.cmp(&b.column))
}

// ============================================================================
// Span
// ============================================================================

/// Half-open range `[from, to)` over positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub from: Position,
    pub to: Position,
}

impl Span {
    /// Create a span. No ordering check is made; see [`Span::is_inverted`].
    pub const fn new(from: Position, to: Position) -> Self {
        Span { from, to }
    }

    /// Span on a single line covering `[from_col, to_col)`.
    pub const fn on_line(line: u32, from_col: u32, to_col: u32) -> Self {
        Span {
            from: Position::new(line, from_col),
            to: Position::new(line, to_col),
        }
    }

    /// True when the span covers no characters.
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// True when `to` lies before `from`.
    pub fn is_inverted(&self) -> bool {
        compare_positions(&self.to, &self.from) == Ordering::Less
    }

    /// True when `pos` lies inside `[from, to)`.
    pub fn contains(&self, pos: &Position) -> bool {
        self.from <= *pos && *pos < self.to
    }

    /// True when the two spans share at least one position.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.from < other.to && other.from < self.to
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

// ============================================================================
// Tests
// ============================================================================
