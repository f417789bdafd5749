//! Command runners behind the `polaris` binary.
//!
//! Each runner talks to a backend through the core traits and returns the
//! text to print. The caller (`src/bin/polaris.rs`) owns argument parsing,
//! tracing setup and error envelopes.
//!
//! ## Error Handling
//!
//! All runners return `PolarisResult`. A `tree` run in which only some
//! targets failed is not an error: it prints a `"partial"` response and
//! reports the first failure's code through [`CommandOutput::code`].

use std::sync::Arc;

use tracing::info;

use crate::annotate::AnnotateOptions;
use crate::complete::CompletionBox;
use crate::error::{OutputErrorCode, PolarisError, PolarisResult};
use crate::expand::{DirectorySource, TreeExpander};
use crate::observer::ClientObserver;
use crate::outline::outline;
use crate::output::{
    AnnotateResponse, CompleteOutput, GotoOutput, OutlineOutput, SearchOutput, TreeResponse,
};
use crate::render::render_html;
use crate::service::{CodeSearch, LoadOutcome, SourceSelector, SourceViewer};
use crate::text::line_count;
use crate::tree::TreeStore;
use crate::types::EntityRef;

/// Text to print plus the exit code it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub body: String,
    /// `None` for full success.
    pub code: Option<OutputErrorCode>,
}

impl CommandOutput {
    fn ok(body: String) -> Self {
        CommandOutput { body, code: None }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> PolarisResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| PolarisError::internal(format!("JSON serialization error: {}", e)))
}

// ============================================================================
// annotate
// ============================================================================

/// Load a file and print its annotation as JSON or HTML.
pub async fn run_annotate<C>(
    backend: &C,
    selector: SourceSelector,
    options: AnnotateOptions,
    html: bool,
    observer: Arc<dyn ClientObserver>,
) -> PolarisResult<CommandOutput>
where
    C: CodeSearch + ?Sized,
{
    let mut viewer = SourceViewer::new().with_observer(observer);
    match viewer.load(backend, selector.clone()).await? {
        LoadOutcome::Installed => {}
        outcome => {
            return Err(PolarisError::backend(format!(
                "backend answered {} with another file ({:?})",
                selector, outcome
            )))
        }
    }
    let loaded = viewer
        .active()
        .ok_or_else(|| PolarisError::internal("viewer has no active file after load"))?;

    let annotation = loaded.annotate(&options)?;
    info!(
        path = %loaded.response.handle.path,
        segments = annotation.segments.len(),
        entities = annotation.index.len(),
        "annotated source"
    );
    let body = if html {
        render_html(&annotation)
    } else {
        let lines = line_count(&loaded.response.source);
        to_json(&AnnotateResponse::new(
            loaded.response.handle.clone(),
            lines,
            annotation,
        ))?
    };
    Ok(CommandOutput::ok(body))
}

// ============================================================================
// tree
// ============================================================================

/// Expand `targets` and print the resulting tree.
pub async fn run_tree<S>(
    project: &str,
    source: S,
    targets: &[String],
    text: bool,
    observer: Arc<dyn ClientObserver>,
) -> PolarisResult<CommandOutput>
where
    S: DirectorySource,
{
    if targets.is_empty() {
        return Err(PolarisError::invalid_args("at least one target path is required"));
    }
    let expander = TreeExpander::new(project, source).with_observer(observer);
    let report = expander.expand(targets).await;
    let code = report
        .failures
        .first()
        .map(|f| PolarisError::from(f.error.clone()).error_code());

    let body = expander.with_store(|store| {
        if text {
            Ok(render_tree_text(store))
        } else {
            to_json(&TreeResponse::new(store, &report))
        }
    })?;
    Ok(CommandOutput { body, code })
}

/// Indented listing of the visible rows; directories end with `/`.
pub fn render_tree_text(store: &TreeStore) -> String {
    let mut out = String::new();
    for row in store.visible_rows() {
        let Some(node) = store.node(row.node) else {
            continue;
        };
        out.push_str(&"  ".repeat(row.depth));
        out.push_str(node.name());
        if node.is_directory() {
            out.push('/');
        }
        out.push('\n');
    }
    out
}

// ============================================================================
// complete / search
// ============================================================================

/// Run one autocomplete query the way the search box does.
pub async fn run_complete<C>(
    backend: &C,
    query: &str,
    limit: usize,
    observer: Arc<dyn ClientObserver>,
) -> PolarisResult<CommandOutput>
where
    C: CodeSearch + ?Sized,
{
    let mut search_box = CompletionBox::new(limit).with_observer(observer);
    let Some(request) = search_box.update(query) else {
        return Err(PolarisError::invalid_args("completion query must not be empty"));
    };
    let response = match backend.complete(&request.query, request.limit).await {
        Ok(response) => response,
        Err(err) => {
            search_box.abort();
            return Err(err);
        }
    };
    search_box.apply(response);
    to_json(&CompleteOutput::new(query, search_box.choices().to_vec())).map(CommandOutput::ok)
}

/// Full-text search returning the first `limit` hits.
pub async fn run_search<C>(backend: &C, query: &str, limit: usize) -> PolarisResult<CommandOutput>
where
    C: CodeSearch + ?Sized,
{
    let response = backend.search(query, 0, limit).await?;
    to_json(&SearchOutput::new(query, response.count, response.hits)).map(CommandOutput::ok)
}

// ============================================================================
// outline / goto
// ============================================================================

/// Print the outline of the types a file declares.
///
/// A path is first resolved to its file id through "read source", the way
/// the source page does it.
pub async fn run_outline<C>(backend: &C, selector: SourceSelector) -> PolarisResult<CommandOutput>
where
    C: CodeSearch + ?Sized,
{
    let handle = backend.read_source(&selector).await?.handle;
    let types = backend.list_types_in_file(handle.id).await?;
    info!(path = %handle.path, types = types.len(), "listed declared types");
    to_json(&OutlineOutput::new(handle, outline(&types))).map(CommandOutput::ok)
}

/// Print where an entity is declared.
pub async fn run_goto<C>(backend: &C, entity: EntityRef) -> PolarisResult<CommandOutput>
where
    C: CodeSearch + ?Sized,
{
    let target = backend.resolve_entity(entity).await?;
    to_json(&GotoOutput::new(entity, target)).map(CommandOutput::ok)
}
