//! Core of the polaris source browser.
//!
//! This crate provides the client-side algorithms, independent of any UI:
//! - Span-merge annotation of source text with cross-reference usages
//! - Entity link index and hover highlighting
//! - Project tree store with lazy, path-driven expansion
//! - Backend contract and stale-response guard for the active file
//! - Autocomplete box state, navigation URLs and HTML rendering
//! - Outlines of the types declared in a file
//! - Error types, error codes and JSON output types for CLI responses

pub mod annotate;
pub mod complete;
pub mod error;
pub mod expand;
pub mod link;
pub mod observer;
pub mod outline;
pub mod output;
pub mod position;
pub mod render;
pub mod service;
pub mod test_support;
pub mod text;
pub mod tree;
pub mod types;
pub mod xref;
