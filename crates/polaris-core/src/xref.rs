//! Cross-reference index over annotated segments.
//!
//! [`EntityLinkIndex`] maps an entity id to the positions of every segment
//! annotated with it, so a view can highlight all occurrences of the entity
//! under the pointer together. The index is a read-only projection of one
//! annotation and is rebuilt whenever the annotator runs again.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::annotate::Segment;
use crate::types::EntityId;

/// Entity id -> segment indices, each list in left-to-right order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EntityLinkIndex {
    groups: BTreeMap<EntityId, Vec<usize>>,
}

impl EntityLinkIndex {
    /// Group annotated segments by entity. Segments without an entity are skipped.
    pub fn build(segments: &[Segment<'_>]) -> Self {
        let mut groups: BTreeMap<EntityId, Vec<usize>> = BTreeMap::new();
        for (i, segment) in segments.iter().enumerate() {
            if let Some(entity) = segment.entity_id() {
                groups.entry(entity).or_default().push(i);
            }
        }
        EntityLinkIndex { groups }
    }

    /// Segment indices sharing `entity`, in source order. Empty when unknown.
    pub fn occurrences(&self, entity: EntityId) -> &[usize] {
        self.groups.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Indices of every segment sharing the entity of `segments[index]`,
    /// including `index` itself.
    pub fn related(&self, segments: &[Segment<'_>], index: usize) -> &[usize] {
        segments
            .get(index)
            .and_then(Segment::entity_id)
            .map(|entity| self.occurrences(entity))
            .unwrap_or(&[])
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.groups.keys().copied()
    }

    /// Number of distinct entities.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Which entity is under the pointer.
///
/// Hovering any segment highlights every segment of the same entity; hovering
/// plain text clears the highlight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightContext {
    active: Option<EntityId>,
}

impl HighlightContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point at `segments[index]`.
    pub fn hover(&mut self, segments: &[Segment<'_>], index: usize) {
        self.active = segments.get(index).and_then(Segment::entity_id);
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<EntityId> {
        self.active
    }

    pub fn is_highlighted(&self, segment: &Segment<'_>) -> bool {
        self.active.is_some() && segment.entity_id() == self.active
    }
}
