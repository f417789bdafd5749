//! Test helpers: a scripted in-memory [`DirectorySource`].
//!
//! Listings are registered per directory path. Every request is logged, so
//! tests can assert exactly which levels were fetched and how often.
//!
//! # Example
//!
//! ```
//! use polaris_core::test_support::ScriptedSource;
//!
//! let source = ScriptedSource::new("p")
//!     .listing("/", &["a/"])
//!     .listing("/a/", &["b/", "d.txt"]);
//! assert_eq!(source.total_calls(), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::{PolarisError, PolarisResult};
use crate::expand::DirectorySource;
use crate::types::{FileHandle, FileId, FileKind};

/// In-memory directory listings with a call log, injectable failures and an
/// optional gate that holds every request until opened.
#[derive(Debug)]
pub struct ScriptedSource {
    project: String,
    listings: HashMap<String, Vec<FileHandle>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedSource {
    pub fn new(project: impl Into<String>) -> Self {
        ScriptedSource {
            project: project.into(),
            listings: HashMap::new(),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Register the children of `directory`. Names ending in `/` are
    /// directories; duplicates are kept as given.
    pub fn listing(mut self, directory: &str, names: &[&str]) -> Self {
        let children = names
            .iter()
            .map(|name| {
                let kind = if name.ends_with('/') {
                    FileKind::Directory
                } else {
                    FileKind::NormalFile
                };
                let id = FileId(self.next_id.fetch_add(1, Ordering::Relaxed));
                FileHandle::new(
                    self.project.clone(),
                    format!("{}{}", directory, name),
                    id,
                    kind,
                )
            })
            .collect();
        self.listings.insert(directory.to_string(), children);
        self
    }

    /// Make requests for `directory` fail until [`recover`](Self::recover).
    pub fn fail(self, directory: &str) -> Self {
        lock(&self.failing).insert(directory.to_string());
        self
    }

    pub fn recover(&self, directory: &str) {
        lock(&self.failing).remove(directory);
    }

    /// Hold every request until [`open_gate`](Self::open_gate) is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Requested directories, in request order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, directory: &str) -> usize {
        lock(&self.calls).iter().filter(|c| *c == directory).count()
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl DirectorySource for ScriptedSource {
    async fn list_children(
        &self,
        project: &str,
        directory: &str,
    ) -> PolarisResult<Vec<FileHandle>> {
        lock(&self.calls).push(directory.to_string());

        if let Some(gate) = &self.gate {
            // The permit goes back on drop, so one opening releases everyone.
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| PolarisError::backend("gate closed"))?;
        }

        if project != self.project {
            return Err(PolarisError::backend(format!("unknown project {}", project)));
        }
        if lock(&self.failing).contains(directory) {
            return Err(PolarisError::backend(format!("listing {} failed", directory)));
        }
        self.listings
            .get(directory)
            .cloned()
            .ok_or_else(|| PolarisError::file_not_found(directory))
    }
}
