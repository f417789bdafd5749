//! Polaris: a source browser client for a code search backend.
//!
//! Annotates source files with cross-reference usages, browses a project's
//! file tree lazily, and drives autocomplete and search, against either a
//! remote backend or a local directory.

// Core algorithms - re-exported from polaris-core
pub use polaris_core::annotate;
pub use polaris_core::complete;
pub use polaris_core::error;
pub use polaris_core::expand;
pub use polaris_core::link;
pub use polaris_core::observer;
pub use polaris_core::outline;
pub use polaris_core::output;
pub use polaris_core::position;
pub use polaris_core::render;
pub use polaris_core::service;
pub use polaris_core::text;
pub use polaris_core::tree;
pub use polaris_core::types;
pub use polaris_core::xref;

// Local backend and configuration
pub mod config;
pub mod local;

// Front door
pub mod cli;
