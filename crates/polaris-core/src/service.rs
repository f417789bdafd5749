//! Backend contract: request/response shapes of the code search service and
//! the guard that keeps a late file load from replacing a newer one.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotate::{annotate_with, AnnotateOptions, Annotation};
use crate::error::{PolarisError, PolarisResult};
use crate::expand::DirectorySource;
use crate::observer::{ClientObserver, NoopObserver};
use crate::outline::TypeInfo;
use crate::types::{EntityRef, FileHandle, FileId, JumpTarget, Usage};

// ============================================================================
// Requests
// ============================================================================

/// The two ways of addressing a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceSelector {
    ById(FileId),
    ByPath { project: String, path: String },
}

impl SourceSelector {
    pub fn by_path(project: impl Into<String>, path: impl Into<String>) -> Self {
        SourceSelector::ByPath {
            project: project.into(),
            path: path.into(),
        }
    }

    /// Whether `handle` is the file this selector addresses.
    pub fn matches(&self, handle: &FileHandle) -> bool {
        match self {
            SourceSelector::ById(id) => handle.id == *id,
            SourceSelector::ByPath { project, path } => {
                handle.project == *project && handle.path == *path
            }
        }
    }
}

impl fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSelector::ById(id) => write!(f, "file #{}", id),
            SourceSelector::ByPath { project, path } => write!(f, "{}:{}", project, path),
        }
    }
}

/// An autocomplete query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub query: String,
    pub limit: usize,
}

/// A full-text search query over the rank window `[rank_from, rank_to)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub rank_from: usize,
    pub rank_to: usize,
}

// ============================================================================
// Responses
// ============================================================================

/// A file's text and its usages, as returned by "read source".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResponse {
    pub handle: FileHandle,
    pub source: String,
    #[serde(default)]
    pub usages: Vec<Usage>,
}

impl SourceResponse {
    pub fn annotate(&self, options: &AnnotateOptions) -> PolarisResult<Annotation<'_>> {
        annotate_with(&self.source, &self.usages, options)
    }
}

/// What an autocomplete hit names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HitKind {
    Type,
    Method,
    Variable,
    File,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionHit {
    pub kind: HitKind,
    /// Display name, e.g. a simple type name or a file base name.
    pub name: String,
    /// Qualified name or path shown next to the display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub jump_target: JumpTarget,
    #[serde(default)]
    pub use_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteResponse {
    #[serde(default)]
    pub hits: Vec<CompletionHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub jump_target: JumpTarget,
    /// The matching line.
    pub summary: String,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
    /// Total number of matches, including those outside the rank window.
    pub count: usize,
}

// ============================================================================
// Service Trait
// ============================================================================

/// The code search backend.
#[async_trait]
pub trait CodeSearch: DirectorySource {
    async fn read_source(&self, selector: &SourceSelector) -> PolarisResult<SourceResponse>;

    async fn complete(&self, query: &str, limit: usize) -> PolarisResult<CompleteResponse>;

    async fn search(
        &self,
        query: &str,
        rank_from: usize,
        rank_to: usize,
    ) -> PolarisResult<SearchResponse>;

    /// Declaration site of a type, method or field.
    async fn resolve_entity(&self, entity: EntityRef) -> PolarisResult<JumpTarget>;

    /// Types declared in a file, with their fields and methods.
    async fn list_types_in_file(&self, file: FileId) -> PolarisResult<Vec<TypeInfo>>;
}

// ============================================================================
// Source Viewer
// ============================================================================

/// Ticket for one file load, handed out by [`SourceViewer::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    selector: SourceSelector,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }
}

/// The file currently displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub generation: u64,
    pub response: SourceResponse,
}

impl LoadedSource {
    pub fn annotate(&self, options: &AnnotateOptions) -> PolarisResult<Annotation<'_>> {
        self.response.annotate(options)
    }
}

/// Load state of the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    Empty,
    Loading { generation: u64 },
    Ready,
    Failed { generation: u64, message: String },
}

/// What happened to a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response became the active file.
    Installed,
    /// A newer load was started; the response was discarded.
    Stale,
    /// The response names a different file than the one requested.
    Mismatched,
}

/// Holds the active file and drops responses for superseded loads.
///
/// Every load takes a ticket with a fresh generation. Only a response whose
/// ticket is the latest one, and whose file matches what was asked for,
/// replaces the active file.
pub struct SourceViewer {
    generation: u64,
    status: ViewStatus,
    active: Option<LoadedSource>,
    observer: Arc<dyn ClientObserver>,
}

impl Default for SourceViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SourceViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceViewer")
            .field("generation", &self.generation)
            .field("status", &self.status)
            .field("active", &self.active.as_ref().map(|a| &a.response.handle))
            .finish()
    }
}

impl SourceViewer {
    pub fn new() -> Self {
        SourceViewer {
            generation: 0,
            status: ViewStatus::Empty,
            active: None,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    pub fn active(&self) -> Option<&LoadedSource> {
        self.active.as_ref()
    }

    /// Start loading `selector`, superseding any load in flight.
    pub fn begin(&mut self, selector: SourceSelector) -> LoadTicket {
        self.generation += 1;
        self.status = ViewStatus::Loading {
            generation: self.generation,
        };
        debug!(generation = self.generation, selector = %selector, "source load started");
        LoadTicket {
            generation: self.generation,
            selector,
        }
    }

    /// Deliver the response for `ticket`.
    pub fn finish(&mut self, ticket: &LoadTicket, response: SourceResponse) -> LoadOutcome {
        if ticket.generation != self.generation {
            info!(
                generation = ticket.generation,
                current = self.generation,
                "dropping stale source response"
            );
            self.observer.stale_response_dropped(ticket.generation);
            return LoadOutcome::Stale;
        }
        if !ticket.selector.matches(&response.handle) {
            info!(
                selector = %ticket.selector,
                path = %response.handle.path,
                "dropping source response for a different file"
            );
            self.observer.stale_response_dropped(ticket.generation);
            return LoadOutcome::Mismatched;
        }
        self.status = ViewStatus::Ready;
        self.active = Some(LoadedSource {
            generation: ticket.generation,
            response,
        });
        LoadOutcome::Installed
    }

    /// Record that the load for `ticket` failed. The active file is kept.
    /// Returns `false` when the ticket was already superseded.
    pub fn fail(&mut self, ticket: &LoadTicket, error: &PolarisError) -> bool {
        if ticket.generation != self.generation {
            self.observer.stale_response_dropped(ticket.generation);
            return false;
        }
        self.status = ViewStatus::Failed {
            generation: ticket.generation,
            message: error.to_string(),
        };
        true
    }

    /// Load `selector` from `backend` and install it.
    pub async fn load<C>(&mut self, backend: &C, selector: SourceSelector) -> PolarisResult<LoadOutcome>
    where
        C: CodeSearch + ?Sized,
    {
        let ticket = self.begin(selector);
        match backend.read_source(ticket.selector()).await {
            Ok(response) => Ok(self.finish(&ticket, response)),
            Err(err) => {
                self.fail(&ticket, &err);
                Err(err)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
