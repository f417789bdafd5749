//! Span-merge annotation of source text.
//!
//! [`annotate`] merges a source text with a position-sorted list of
//! non-overlapping [`Usage`]s into an ordered list of [`Segment`]s: runs of plain
//! text and runs annotated with the usage covering them. The segments borrow
//! both the text and the usages, and concatenating their texts reproduces the
//! source exactly.
//!
//! ## Input Contract
//!
//! Usages must be sorted by `span.from`, must not overlap, and must not be
//! inverted. The contract is checked by [`validate_usages`] before merging and
//! a violation is reported as [`PolarisError::MalformedUsageData`]; the merge
//! itself never re-sorts.
//!
//! ## Merge Policy
//!
//! - Unresolved usages (`entity_id == None`) stay part of the surrounding plain run
//! - Zero-width usages are dropped and counted in [`Annotation::dropped`]
//! - A usage whose start does not address a character of the text is skipped
//!   and counted in [`Annotation::skipped`]
//! - Two usages with no gap between them are both annotated
//! - Usages of unknown kind are rejected, or demoted to plain text when
//!   [`UnknownKindPolicy::Demote`] is selected

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{MalformedReason, PolarisError, PolarisResult};
use crate::position::Position;
use crate::text::position_to_offset;
use crate::types::{EntityId, Usage};
use crate::xref::EntityLinkIndex;

// ============================================================================
// Segments
// ============================================================================

/// A contiguous run of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "segment", rename_all = "lowercase")]
pub enum Segment<'a> {
    /// Literal text with no cross-reference.
    Plain { text: &'a str },
    /// Text covered by a resolved usage.
    Annotated { text: &'a str, usage: &'a Usage },
}

impl<'a> Segment<'a> {
    pub fn text(&self) -> &'a str {
        match *self {
            Segment::Plain { text } | Segment::Annotated { text, .. } => text,
        }
    }

    pub fn usage(&self) -> Option<&'a Usage> {
        match *self {
            Segment::Plain { .. } => None,
            Segment::Annotated { usage, .. } => Some(usage),
        }
    }

    /// Entity of an annotated segment.
    pub fn entity_id(&self) -> Option<EntityId> {
        self.usage().and_then(|usage| usage.entity_id)
    }
}

// ============================================================================
// Options
// ============================================================================

/// What to do with a usage whose kind is not TYPE, METHOD or VARIABLE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKindPolicy {
    /// Reject the usage list with [`MalformedReason::UnknownKind`].
    #[default]
    Reject,
    /// Log a warning and keep the usage's text as plain text.
    Demote,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotateOptions {
    pub unknown_kinds: UnknownKindPolicy,
}

impl AnnotateOptions {
    pub fn demote_unknown() -> Self {
        AnnotateOptions {
            unknown_kinds: UnknownKindPolicy::Demote,
        }
    }
}

// ============================================================================
// Annotation
// ============================================================================

/// Result of merging a source text with its usages.
#[derive(Debug, Clone, Serialize)]
pub struct Annotation<'a> {
    pub segments: Vec<Segment<'a>>,
    #[serde(rename = "entityIndex")]
    pub index: EntityLinkIndex,
    /// Usages passed over because their start does not address a character.
    pub skipped: usize,
    /// Zero-width usages that produced no segment.
    pub dropped: usize,
    /// Usages of unknown kind rendered as plain text.
    pub demoted: usize,
}

impl<'a> Annotation<'a> {
    /// Concatenation of all segment texts.
    pub fn text(&self) -> String {
        self.segments.iter().map(Segment::text).collect()
    }

    /// Segments annotated with `entity`, in source order.
    pub fn segments_for(&self, entity: EntityId) -> impl Iterator<Item = &Segment<'a>> + '_ {
        self.index
            .occurrences(entity)
            .iter()
            .filter_map(|&i| self.segments.get(i))
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Check the annotator's input contract.
pub fn validate_usages(usages: &[Usage], options: &AnnotateOptions) -> PolarisResult<()> {
    let mut previous: Option<&Usage> = None;
    for (index, usage) in usages.iter().enumerate() {
        let span = usage.span;
        if span.is_inverted() {
            return Err(PolarisError::malformed(index, MalformedReason::Inverted { span }));
        }
        if !usage.kind.is_known() && options.unknown_kinds == UnknownKindPolicy::Reject {
            return Err(PolarisError::malformed(index, MalformedReason::UnknownKind));
        }
        if let Some(prev) = previous {
            if span.from < prev.span.from {
                return Err(PolarisError::malformed(
                    index,
                    MalformedReason::Unsorted {
                        previous: prev.span,
                        span,
                    },
                ));
            }
            if span.from < prev.span.to {
                return Err(PolarisError::malformed(
                    index,
                    MalformedReason::Overlapping {
                        previous: prev.span,
                        span,
                    },
                ));
            }
        }
        previous = Some(usage);
    }
    Ok(())
}

// ============================================================================
// Merge
// ============================================================================

/// Annotate `source` with `usages` using the default options.
pub fn annotate<'a>(source: &'a str, usages: &'a [Usage]) -> PolarisResult<Annotation<'a>> {
    annotate_with(source, usages, &AnnotateOptions::default())
}

/// Annotate `source` with `usages`.
///
/// Runs in one left-to-right pass over the characters; the usage cursor only
/// moves forward.
pub fn annotate_with<'a>(
    source: &'a str,
    usages: &'a [Usage],
    options: &AnnotateOptions,
) -> PolarisResult<Annotation<'a>> {
    validate_usages(usages, options)?;

    let mut out = SegmentWriter::new(source);
    let mut cur = Position::origin();
    let mut j = 0usize;
    let mut open: Option<usize> = None;
    let mut skipped = 0usize;
    let mut dropped = 0usize;

    // Every character offset plus the end-of-text offset, so a usage ending
    // exactly at the end of the text is closed.
    let offsets = source
        .char_indices()
        .map(|(i, ch)| (i, Some(ch)))
        .chain(std::iter::once((source.len(), None)));

    for (i, ch) in offsets {
        // Close before opening so a usage starting where the previous one
        // ends is still annotated.
        if let Some(start) = open {
            let usage = &usages[j];
            if usage.span.to <= cur {
                out.usage(start, i, usage);
                open = None;
                j += 1;
            }
        }

        if open.is_none() {
            while let Some(usage) = usages.get(j) {
                if usage.span.from < cur {
                    warn!(index = j, span = %usage.span, "skipping usage behind scan position");
                    skipped += 1;
                } else if usage.span.from == cur && usage.span.is_empty() {
                    debug!(index = j, span = %usage.span, "dropping zero-width usage");
                    dropped += 1;
                } else {
                    break;
                }
                j += 1;
            }
            if usages.get(j).is_some_and(|usage| usage.span.from == cur) {
                open = Some(i);
            }
        }

        if let Some(ch) = ch {
            cur.advance(ch);
        }
    }

    // A usage still open ran past the end of the text. The rest start past
    // the end of their line and are skipped, as they would be mid-text.
    if open.is_some() {
        return Err(PolarisError::malformed(
            j,
            MalformedReason::OutOfBounds {
                span: usages[j].span,
            },
        ));
    }
    for (index, usage) in usages.iter().enumerate().skip(j) {
        if position_to_offset(source, usage.span.from).is_some() {
            return Err(PolarisError::malformed(
                index,
                MalformedReason::OutOfBounds { span: usage.span },
            ));
        }
        warn!(index, span = %usage.span, "skipping usage past the end of the text");
        skipped += 1;
    }

    let demoted = out.demoted;
    let segments = out.finish();
    let index = EntityLinkIndex::build(&segments);
    Ok(Annotation {
        segments,
        index,
        skipped,
        dropped,
        demoted,
    })
}

/// Accumulates segments, coalescing plain text by offset.
struct SegmentWriter<'a> {
    source: &'a str,
    segments: Vec<Segment<'a>>,
    plain_start: usize,
    demoted: usize,
}

impl<'a> SegmentWriter<'a> {
    fn new(source: &'a str) -> Self {
        SegmentWriter {
            source,
            segments: Vec::new(),
            plain_start: 0,
            demoted: 0,
        }
    }

    /// Record a closed usage covering `source[start..end]`.
    fn usage(&mut self, start: usize, end: usize, usage: &'a Usage) {
        if !usage.kind.is_known() {
            warn!(span = %usage.span, "unknown usage kind, rendering as plain text");
            self.demoted += 1;
            return;
        }
        if usage.entity_id.is_none() {
            // Unresolved: the text stays in the current plain run.
            return;
        }
        self.flush_plain(start);
        self.segments.push(Segment::Annotated {
            text: &self.source[start..end],
            usage,
        });
        self.plain_start = end;
    }

    fn flush_plain(&mut self, end: usize) {
        if end > self.plain_start {
            self.segments.push(Segment::Plain {
                text: &self.source[self.plain_start..end],
            });
        }
        self.plain_start = end;
    }

    fn finish(mut self) -> Vec<Segment<'a>> {
        self.flush_plain(self.source.len());
        self.segments
    }
}

// ============================================================================
// Tests
// ============================================================================
