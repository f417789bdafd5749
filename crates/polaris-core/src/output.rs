//! JSON output types and serialization for CLI responses.
//!
//! ## Design Principles
//!
//! 1. **Status first:** Every response has `status` as first field
//! 2. **Deterministic:** Same input -> same output (field order, array ordering)
//! 3. **Versioned:** Schema version in response enables forward compatibility

use std::io::{self, Write};

use serde::Serialize;

use crate::annotate::Annotation;
use crate::complete::Choice;
use crate::error::{OutputErrorCode, PolarisError};
use crate::expand::ExpansionReport;
use crate::link::source_url;
use crate::outline::OutlineType;
use crate::service::SearchHit;
use crate::tree::{TreeStore, ViewState};
use crate::types::{EntityRef, FileHandle, FileKind, JumpTarget};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Error Types
// ============================================================================

/// Error information for error responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Numeric error code, also the process exit code.
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &PolarisError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let details = match err {
            PolarisError::MalformedUsageData { index, reason } => Some(serde_json::json!({
                "usage_index": index,
                "reason": reason.to_string(),
            })),
            PolarisError::NoMatchingChild { path, component } => Some(serde_json::json!({
                "path": path,
                "component": component,
            })),
            PolarisError::AmbiguousChild {
                path,
                component,
                count,
            } => Some(serde_json::json!({
                "path": path,
                "component": component,
                "count": count,
            })),
            PolarisError::FetchFailed { path, .. } | PolarisError::FileNotFound { path } => {
                Some(serde_json::json!({ "path": path }))
            }
            PolarisError::EntityNotFound { kind, id } => Some(serde_json::json!({
                "kind": kind,
                "id": id,
            })),
            _ => None,
        };
        ErrorInfo {
            code,
            message: err.to_string(),
            details,
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &PolarisError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Annotate
// ============================================================================

/// Response for `annotate`.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotateResponse<'a> {
    pub status: String,
    pub schema_version: String,
    pub file: FileHandle,
    /// Line numbers for the gutter.
    pub lines: usize,
    #[serde(flatten)]
    pub annotation: Annotation<'a>,
}

impl<'a> AnnotateResponse<'a> {
    pub fn new(file: FileHandle, lines: usize, annotation: Annotation<'a>) -> Self {
        AnnotateResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            file,
            lines,
            annotation,
        }
    }
}

// ============================================================================
// Tree
// ============================================================================

/// A target that resolved to a node.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedInfo {
    pub target: String,
    pub path: String,
    pub kind: FileKind,
}

/// A target that failed, with its error code.
#[derive(Debug, Clone, Serialize)]
pub struct BranchFailureInfo {
    pub target: String,
    pub error: ErrorInfo,
}

/// One visible row of the tree.
#[derive(Debug, Clone, Serialize)]
pub struct RowInfo {
    pub depth: usize,
    pub name: String,
    pub path: String,
    pub kind: FileKind,
    pub view: ViewState,
}

/// Response for `tree`.
#[derive(Debug, Clone, Serialize)]
pub struct TreeResponse {
    pub status: String,
    pub schema_version: String,
    pub project: String,
    pub resolved: Vec<ResolvedInfo>,
    pub failures: Vec<BranchFailureInfo>,
    pub rows: Vec<RowInfo>,
}

impl TreeResponse {
    /// Status is `"ok"` when every target resolved, `"partial"` otherwise.
    pub fn new(store: &TreeStore, report: &ExpansionReport) -> Self {
        let resolved = report
            .resolved
            .iter()
            .filter_map(|r| {
                store.node(r.node).map(|node| ResolvedInfo {
                    target: r.target.clone(),
                    path: node.path().to_string(),
                    kind: node.kind(),
                })
            })
            .collect();
        let failures = report
            .failures
            .iter()
            .map(|f| BranchFailureInfo {
                target: f.target.clone(),
                error: ErrorInfo::from_error(&PolarisError::from(f.error.clone())),
            })
            .collect();
        let rows = store
            .visible_rows()
            .into_iter()
            .filter_map(|row| {
                store.node(row.node).map(|node| RowInfo {
                    depth: row.depth,
                    name: node.name().to_string(),
                    path: node.path().to_string(),
                    kind: node.kind(),
                    view: node.view(),
                })
            })
            .collect();
        TreeResponse {
            status: if report.is_complete() { "ok" } else { "partial" }.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            project: store.project().to_string(),
            resolved,
            failures,
            rows,
        }
    }
}

// ============================================================================
// Complete and Search
// ============================================================================

/// Response for `complete`.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteOutput {
    pub status: String,
    pub schema_version: String,
    pub query: String,
    pub choices: Vec<Choice>,
}

impl CompleteOutput {
    pub fn new(query: impl Into<String>, choices: Vec<Choice>) -> Self {
        CompleteOutput {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            query: query.into(),
            choices,
        }
    }
}

/// Response for `search`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    pub status: String,
    pub schema_version: String,
    pub query: String,
    pub count: usize,
    pub hits: Vec<SearchHit>,
}

impl SearchOutput {
    pub fn new(query: impl Into<String>, count: usize, hits: Vec<SearchHit>) -> Self {
        SearchOutput {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            query: query.into(),
            count,
            hits,
        }
    }
}

// ============================================================================
// Outline and Goto
// ============================================================================

/// Response for `outline`.
#[derive(Debug, Clone, Serialize)]
pub struct OutlineOutput {
    pub status: String,
    pub schema_version: String,
    pub file: FileHandle,
    pub types: Vec<OutlineType>,
}

impl OutlineOutput {
    pub fn new(file: FileHandle, types: Vec<OutlineType>) -> Self {
        OutlineOutput {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            file,
            types,
        }
    }
}

/// Response for `goto`: where an entity is declared.
#[derive(Debug, Clone, Serialize)]
pub struct GotoOutput {
    pub status: String,
    pub schema_version: String,
    pub entity: EntityRef,
    pub target: JumpTarget,
    pub url: String,
}

impl GotoOutput {
    pub fn new(entity: EntityRef, target: JumpTarget) -> Self {
        GotoOutput {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            entity,
            url: source_url(&target),
            target,
        }
    }
}

// ============================================================================
// Response Emission
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
///
/// This is the single output path for CLI, ensuring consistency.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;
    use crate::error::MalformedReason;
    use crate::expand::{BranchFailure, ExpandError, ResolvedTarget};
    use crate::position::Span;
    use crate::types::FileId;

    mod error_tests {
        use super::*;

        #[test]
        fn error_response_has_status_first() {
            let err = PolarisError::file_not_found("/A.java");
            let mut out = Vec::new();
            emit_response(&ErrorResponse::from_error(&err), &mut out).unwrap();
            let text = String::from_utf8(out).unwrap();
            let status = text.find("\"status\"").unwrap();
            let version = text.find("\"schema_version\"").unwrap();
            assert!(status < version);

            let json: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(json["status"], "error");
            assert_eq!(json["error"]["code"], 3);
            assert_eq!(json["error"]["details"]["path"], "/A.java");
        }

        #[test]
        fn entity_not_found_details() {
            let err = PolarisError::EntityNotFound {
                kind: crate::types::UsageKind::Type,
                id: crate::types::EntityId(12),
            };
            let info = ErrorInfo::from_error(&err);
            assert_eq!(info.code, 3);
            let details = info.details.unwrap();
            assert_eq!(details["kind"], "TYPE");
            assert_eq!(details["id"], 12);
        }

        #[test]
        fn malformed_details_name_the_usage() {
            let err = PolarisError::malformed(
                4,
                MalformedReason::Inverted {
                    span: Span::on_line(0, 5, 2),
                },
            );
            let info = ErrorInfo::from_error(&err);
            assert_eq!(info.code, 2);
            assert_eq!(info.details.unwrap()["usage_index"], 4);
        }

        #[test]
        fn internal_errors_carry_no_details() {
            let info = ErrorInfo::from_error(&PolarisError::internal("boom"));
            assert_eq!(info.code, 10);
            assert!(info.details.is_none());
        }
    }

    mod response_tests {
        use super::*;

        #[test]
        fn annotate_response_flattens_annotation() {
            let annotation = annotate("abc\n", &[]).unwrap();
            let file = FileHandle::new("p", "/a.txt", FileId(1), FileKind::NormalFile);
            let json = serde_json::to_value(AnnotateResponse::new(file, 1, annotation)).unwrap();
            assert_eq!(json["status"], "ok");
            assert_eq!(json["lines"], 1);
            assert_eq!(json["segments"][0]["text"], "abc\n");
            assert!(json["entityIndex"].as_object().unwrap().is_empty());
        }

        #[test]
        fn tree_response_reports_partial_failure() {
            let mut store = TreeStore::new("p");
            let root = store.root();
            store.attach_children(
                root,
                vec![FileHandle::new("p", "/a.txt", FileId(1), FileKind::NormalFile)],
            );
            store.mark_expanded(root);
            let a = store.children_named(root, "a.txt")[0];
            let report = ExpansionReport {
                resolved: vec![ResolvedTarget {
                    target: "/a.txt".to_string(),
                    node: a,
                }],
                failures: vec![BranchFailure {
                    target: "/b/c".to_string(),
                    error: ExpandError::NoMatchingChild {
                        path: "/b/c".to_string(),
                        component: "b".to_string(),
                    },
                }],
            };
            let response = TreeResponse::new(&store, &report);
            assert_eq!(response.status, "partial");
            assert_eq!(response.resolved[0].path, "/a.txt");
            assert_eq!(response.failures[0].error.code, 3);
            assert_eq!(response.rows.len(), 1);
            assert_eq!(response.rows[0].name, "a.txt");
        }
    }

    mod goto_tests {
        use super::*;
        use crate::types::{EntityId, UsageKind};

        #[test]
        fn goto_links_to_the_declaration() {
            let target = JumpTarget::new(
                FileHandle::new("demo", "/src/Foo.java", FileId(2), FileKind::NormalFile),
                Some(Span::on_line(6, 4, 7)),
            );
            let entity = EntityRef {
                kind: UsageKind::Method,
                id: EntityId(9),
            };
            let json = serde_json::to_value(GotoOutput::new(entity, target)).unwrap();
            assert_eq!(json["status"], "ok");
            assert_eq!(json["url"], "demo/src/Foo.java?line=6");
            assert_eq!(json["entity"]["kind"], "METHOD");
            assert_eq!(json["target"]["file"]["path"], "/src/Foo.java");
        }
    }
}
