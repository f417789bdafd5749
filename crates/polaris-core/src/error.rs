//! Error types and error code constants for polaris.
//!
//! This module provides a unified error type (`PolarisError`) that bridges
//! domain-specific errors from the annotator, the tree expander and the
//! backend into a common format suitable for JSON output.
//!
//! ## Error Code Mapping
//!
//! Exit codes:
//! - `2`: Invalid arguments (bad input from caller, malformed usage data)
//! - `3`: Resolution errors (no matching child, ambiguous child, file or
//!   entity not found)
//! - `4`: Backend errors (failed fetch, failed backend request)
//! - `10`: Internal errors (bugs, unexpected state)
//!
//! ## Design
//!
//! - **Unified type**: `PolarisError` is the single error type for CLI output
//! - **Bridging**: `impl From<X> for PolarisError` bridges domain errors
//! - **Code mapping**: `OutputErrorCode` provides stable integer codes for JSON

use std::fmt;

use thiserror::Error;

use crate::position::Span;
use crate::types::{EntityId, EntityRef, UsageKind};

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed usage data).
    InvalidArguments = 2,
    /// Resolution errors (missing or ambiguous child, file not found).
    ResolutionError = 3,
    /// Backend errors (directory fetch or source read failed).
    BackendError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Malformed Usage Reasons
// ============================================================================

/// Why a usage list was rejected at the annotator boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// The span ends before it starts.
    Inverted { span: Span },
    /// The usage starts before the previous usage.
    Unsorted { previous: Span, span: Span },
    /// The usage starts before the previous usage ends.
    Overlapping { previous: Span, span: Span },
    /// The usage kind is not one of TYPE, METHOD, VARIABLE.
    UnknownKind,
    /// The span does not end within the source text.
    OutOfBounds { span: Span },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::Inverted { span } => write!(f, "span {} ends before it starts", span),
            MalformedReason::Unsorted { previous, span } => {
                write!(f, "span {} starts before preceding span {}", span, previous)
            }
            MalformedReason::Overlapping { previous, span } => {
                write!(f, "span {} overlaps preceding span {}", span, previous)
            }
            MalformedReason::UnknownKind => f.write_str("unrecognized usage kind"),
            MalformedReason::OutOfBounds { span } => {
                write!(f, "span {} extends past the end of the source", span)
            }
        }
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for library callers and CLI output.
#[derive(Debug, Error)]
pub enum PolarisError {
    /// A usage list violates the annotator's input contract.
    #[error("malformed usage data at usage {index}: {reason}")]
    MalformedUsageData { index: usize, reason: MalformedReason },

    /// No child of a directory matched a target path component.
    #[error("no matching child '{component}' while expanding {path}")]
    NoMatchingChild { path: String, component: String },

    /// More than one child of a directory matched a target path component.
    #[error("ambiguous child name '{component}' ({count} matches) while expanding {path}")]
    AmbiguousChild {
        path: String,
        component: String,
        count: usize,
    },

    /// A directory listing could not be fetched.
    #[error("failed to fetch {path}: {message}")]
    FetchFailed { path: String, message: String },

    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// No declaration is known for an entity.
    #[error("entity not found: {kind} #{id}")]
    EntityNotFound { kind: UsageKind, id: EntityId },

    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The backend failed to answer a request.
    #[error("backend error: {message}")]
    Backend { message: String },

    /// Configuration could not be loaded.
    #[error("config error: {message}")]
    Config { message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&PolarisError> for OutputErrorCode {
    fn from(err: &PolarisError) -> Self {
        match err {
            PolarisError::MalformedUsageData { .. } => OutputErrorCode::InvalidArguments,
            PolarisError::NoMatchingChild { .. } => OutputErrorCode::ResolutionError,
            PolarisError::AmbiguousChild { .. } => OutputErrorCode::ResolutionError,
            PolarisError::FetchFailed { .. } => OutputErrorCode::BackendError,
            PolarisError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            PolarisError::EntityNotFound { .. } => OutputErrorCode::ResolutionError,
            PolarisError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            PolarisError::Backend { .. } => OutputErrorCode::BackendError,
            PolarisError::Config { .. } => OutputErrorCode::InvalidArguments,
            PolarisError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<PolarisError> for OutputErrorCode {
    fn from(err: PolarisError) -> Self {
        OutputErrorCode::from(&err)
    }
}

impl From<std::io::Error> for PolarisError {
    fn from(err: std::io::Error) -> Self {
        PolarisError::InternalError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for PolarisError {
    fn from(err: serde_json::Error) -> Self {
        PolarisError::InternalError {
            message: format!("JSON error: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl PolarisError {
    /// Create a malformed usage data error.
    pub fn malformed(index: usize, reason: MalformedReason) -> Self {
        PolarisError::MalformedUsageData { index, reason }
    }

    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        PolarisError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        PolarisError::Backend {
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        PolarisError::FileNotFound { path: path.into() }
    }

    /// Create an entity not found error.
    pub fn entity_not_found(entity: EntityRef) -> Self {
        PolarisError::EntityNotFound {
            kind: entity.kind,
            id: entity.id,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        PolarisError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

/// Result alias used across the crate.
pub type PolarisResult<T> = Result<T, PolarisError>;

// ============================================================================
// Tests
// ============================================================================
