//! Lazy, path-driven expansion of the project tree.
//!
//! [`TreeExpander`] walks from the root toward each target path one directory
//! level at a time, fetching a level from the [`DirectorySource`] only when the
//! node is still unfetched. Several targets are expanded concurrently.
//!
//! ## Fetch Sharing
//!
//! Every directory level is fetched at most once:
//!
//! - A fetched node answers from its cached children
//! - An unfetched node with a fetch in flight is awaited, not fetched again
//! - Otherwise the caller becomes the fetcher and publishes the outcome to
//!   everyone waiting on it
//!
//! A failed fetch leaves the node unfetched and is delivered to every waiter;
//! nothing retries on its own. If the fetching task is dropped before it
//! answers, one waiter takes the fetch over.
//!
//! ## Locking
//!
//! The tree and the in-flight table sit behind `std::sync::Mutex`es that are
//! only taken in synchronous helpers, never across an `.await`. When both are
//! needed, the tree lock is taken first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{PolarisError, PolarisResult};
use crate::observer::{ClientObserver, NoopObserver};
use crate::tree::{NodeId, TreeStore};
use crate::types::FileHandle;

// ============================================================================
// Data Source
// ============================================================================

/// Lists one directory level of a project.
///
/// The `#[async_trait]` macro keeps the trait object-safe so expanders can be
/// built over `Box<dyn DirectorySource>`.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Children of `directory` (a path starting and ending with `/`).
    async fn list_children(&self, project: &str, directory: &str)
        -> PolarisResult<Vec<FileHandle>>;
}

#[async_trait]
impl<T: DirectorySource + ?Sized> DirectorySource for Box<T> {
    async fn list_children(
        &self,
        project: &str,
        directory: &str,
    ) -> PolarisResult<Vec<FileHandle>> {
        (**self).list_children(project, directory).await
    }
}

#[async_trait]
impl<T: DirectorySource + ?Sized> DirectorySource for Arc<T> {
    async fn list_children(
        &self,
        project: &str,
        directory: &str,
    ) -> PolarisResult<Vec<FileHandle>> {
        (**self).list_children(project, directory).await
    }
}

// ============================================================================
// Results
// ============================================================================

/// Why one target path could not be expanded. Other targets are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
    /// A relative target path, or a file where a directory is needed.
    #[error("invalid expansion target: {target}")]
    InvalidTarget { target: String },

    #[error("no matching child '{component}' while expanding {path}")]
    NoMatchingChild { path: String, component: String },

    #[error("ambiguous child name '{component}' ({count} matches) while expanding {path}")]
    AmbiguousChild {
        path: String,
        component: String,
        count: usize,
    },

    #[error("failed to fetch {path}: {message}")]
    FetchFailed { path: String, message: String },

    /// The tree was discarded while this target was being expanded.
    #[error("tree discarded while expanding {path}")]
    Discarded { path: String },
}

impl From<ExpandError> for PolarisError {
    fn from(err: ExpandError) -> Self {
        match err {
            ExpandError::InvalidTarget { target } => {
                PolarisError::invalid_args(format!("invalid expansion target: {}", target))
            }
            ExpandError::NoMatchingChild { path, component } => {
                PolarisError::NoMatchingChild { path, component }
            }
            ExpandError::AmbiguousChild {
                path,
                component,
                count,
            } => PolarisError::AmbiguousChild {
                path,
                component,
                count,
            },
            ExpandError::FetchFailed { path, message } => {
                PolarisError::FetchFailed { path, message }
            }
            ExpandError::Discarded { path } => {
                PolarisError::internal(format!("tree discarded while expanding {}", path))
            }
        }
    }
}

/// A target that could not be expanded, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFailure {
    pub target: String,
    pub error: ExpandError,
}

/// A target path and the node it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub target: String,
    pub node: NodeId,
}

/// Outcome of expanding a batch of target paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    pub resolved: Vec<ResolvedTarget>,
    pub failures: Vec<BranchFailure>,
}

impl ExpansionReport {
    /// True when every target resolved.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn node_for(&self, target: &str) -> Option<NodeId> {
        self.resolved
            .iter()
            .find(|r| r.target == target)
            .map(|r| r.node)
    }

    pub fn failure_for(&self, target: &str) -> Option<&ExpandError> {
        self.failures
            .iter()
            .find(|f| f.target == target)
            .map(|f| &f.error)
    }
}

// ============================================================================
// Expander
// ============================================================================

/// Published result of one directory fetch; `None` while in flight.
type FetchOutcome = Option<Result<(), ExpandError>>;

struct InFlight {
    ticket: u64,
    rx: watch::Receiver<FetchOutcome>,
}

enum Claim {
    Done,
    Fetch {
        project: String,
        ticket: u64,
        tx: watch::Sender<FetchOutcome>,
    },
    Wait {
        project: String,
        ticket: u64,
        rx: watch::Receiver<FetchOutcome>,
    },
}

/// Expands a [`TreeStore`] on demand from a [`DirectorySource`].
pub struct TreeExpander<S> {
    source: S,
    store: Mutex<TreeStore>,
    inflight: Mutex<HashMap<NodeId, InFlight>>,
    next_ticket: AtomicU64,
    observer: Arc<dyn ClientObserver>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: DirectorySource> TreeExpander<S> {
    /// Create an expander over an empty tree for `project`.
    pub fn new(project: impl Into<String>, source: S) -> Self {
        TreeExpander {
            source,
            store: Mutex::new(TreeStore::new(project)),
            inflight: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Report fetch traffic to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn project(&self) -> String {
        lock(&self.store).project().to_string()
    }

    /// Run `f` against the current tree.
    pub fn with_store<R>(&self, f: impl FnOnce(&TreeStore) -> R) -> R {
        f(&lock(&self.store))
    }

    /// Hide the children of `node`. Cached children are kept.
    pub fn collapse(&self, node: NodeId) {
        lock(&self.store).collapse(node);
    }

    /// Discard the tree and start over for `project`.
    pub fn switch_project(&self, project: impl Into<String>) {
        let mut store = lock(&self.store);
        store.reset(project);
        lock(&self.inflight).clear();
    }

    /// Expand every target path concurrently.
    ///
    /// Failures are collected per target; one failing target never stops the
    /// others.
    pub async fn expand<I, T>(&self, targets: I) -> ExpansionReport
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let targets: Vec<String> = targets
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect();
        let outcomes = join_all(targets.iter().map(|t| self.expand_path(t))).await;

        let mut report = ExpansionReport::default();
        for (target, outcome) in targets.into_iter().zip(outcomes) {
            match outcome {
                Ok(node) => report.resolved.push(ResolvedTarget { target, node }),
                Err(error) => {
                    warn!(target = %target, error = %error, "expansion branch failed");
                    report.failures.push(BranchFailure { target, error });
                }
            }
        }
        report
    }

    /// Expand the tree along one target path and return the node it names.
    ///
    /// Every directory on the way is fetched if needed and marked expanded.
    /// A target ending in `/` names the directory itself; otherwise the last
    /// component is looked up among the children of the deepest directory
    /// without fetching it.
    pub async fn expand_path(&self, target: &str) -> Result<NodeId, ExpandError> {
        if !target.starts_with('/') {
            return Err(ExpandError::InvalidTarget {
                target: target.to_string(),
            });
        }
        let mut node = lock(&self.store).root();
        let mut p = 0usize;
        loop {
            self.ensure_fetched(node, &target[..=p]).await?;
            lock(&self.store).mark_expanded(node);

            let rest = &target[p + 1..];
            match rest.find('/') {
                None if rest.is_empty() => return Ok(node),
                None => return self.single_child(node, target, rest),
                Some(offset) => {
                    let q = p + 1 + offset;
                    node = self.single_child(node, target, &target[p + 1..q])?;
                    p = q;
                }
            }
        }
    }

    /// Expand a single directory, as when its row is clicked.
    ///
    /// File nodes have nothing to expand and are rejected.
    pub async fn expand_node(&self, node: NodeId) -> Result<(), ExpandError> {
        let found = self.with_store(|store| {
            store
                .node(node)
                .map(|n| (n.is_directory(), n.path().to_string()))
        });
        let path = match found {
            None => {
                return Err(ExpandError::Discarded {
                    path: format!("{:?}", node),
                })
            }
            Some((false, path)) => return Err(ExpandError::InvalidTarget { target: path }),
            Some((true, path)) => directory_path(&path),
        };
        self.ensure_fetched(node, &path).await?;
        lock(&self.store).mark_expanded(node);
        Ok(())
    }

    fn single_child(
        &self,
        node: NodeId,
        target: &str,
        component: &str,
    ) -> Result<NodeId, ExpandError> {
        let matches = lock(&self.store).children_named(node, component);
        match matches.as_slice() {
            [only] => Ok(*only),
            [] => Err(ExpandError::NoMatchingChild {
                path: target.to_string(),
                component: component.to_string(),
            }),
            many => Err(ExpandError::AmbiguousChild {
                path: target.to_string(),
                component: component.to_string(),
                count: many.len(),
            }),
        }
    }

    /// Make sure `node` has its children, fetching `directory` at most once.
    async fn ensure_fetched(&self, node: NodeId, directory: &str) -> Result<(), ExpandError> {
        loop {
            match self.claim(node, directory)? {
                Claim::Done => return Ok(()),
                Claim::Fetch {
                    project,
                    ticket,
                    tx,
                } => return self.fetch_level(node, &project, directory, ticket, tx).await,
                Claim::Wait {
                    project,
                    ticket,
                    mut rx,
                } => {
                    debug!(project = %project, path = directory, "waiting on in-flight fetch");
                    self.observer.fetch_shared(&project, directory);
                    let outcome = rx
                        .wait_for(Option::is_some)
                        .await
                        .map(|outcome| (*outcome).clone());
                    match outcome {
                        Ok(Some(result)) => return result,
                        Ok(None) => continue,
                        Err(_) => {
                            debug!(path = directory, "fetcher went away, taking over");
                            self.forget(node, ticket);
                        }
                    }
                }
            }
        }
    }

    /// Decide whether `node` is ready, already being fetched, or ours to fetch.
    fn claim(&self, node: NodeId, directory: &str) -> Result<Claim, ExpandError> {
        let store = lock(&self.store);
        let Some(n) = store.node(node) else {
            return Err(ExpandError::Discarded {
                path: directory.to_string(),
            });
        };
        if n.is_fetched() {
            return Ok(Claim::Done);
        }
        let project = store.project().to_string();
        let mut inflight = lock(&self.inflight);
        if let Some(entry) = inflight.get(&node) {
            return Ok(Claim::Wait {
                project,
                ticket: entry.ticket,
                rx: entry.rx.clone(),
            });
        }
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        inflight.insert(node, InFlight { ticket, rx });
        Ok(Claim::Fetch {
            project,
            ticket,
            tx,
        })
    }

    /// Drop the in-flight entry for `node` if it is still the one for `ticket`.
    fn forget(&self, node: NodeId, ticket: u64) {
        let mut inflight = lock(&self.inflight);
        if inflight.get(&node).is_some_and(|e| e.ticket == ticket) {
            inflight.remove(&node);
        }
    }

    async fn fetch_level(
        &self,
        node: NodeId,
        project: &str,
        directory: &str,
        ticket: u64,
        tx: watch::Sender<FetchOutcome>,
    ) -> Result<(), ExpandError> {
        debug!(project, path = directory, "fetching directory listing");
        self.observer.fetch_started(project, directory);

        let outcome = match self.source.list_children(project, directory).await {
            Ok(children) => {
                let count = children.len();
                if self.attach(node, ticket, children) {
                    self.observer.fetch_finished(project, directory, count);
                    Ok(())
                } else {
                    Err(ExpandError::Discarded {
                        path: directory.to_string(),
                    })
                }
            }
            Err(err) => {
                self.forget(node, ticket);
                let message = err.to_string();
                warn!(project, path = directory, error = %message, "directory fetch failed");
                self.observer.fetch_failed(project, directory, &message);
                Err(ExpandError::FetchFailed {
                    path: directory.to_string(),
                    message,
                })
            }
        };
        tx.send_replace(Some(outcome.clone()));
        outcome
    }

    fn attach(&self, node: NodeId, ticket: u64, children: Vec<FileHandle>) -> bool {
        let mut store = lock(&self.store);
        let attached = store.attach_children(node, children);
        drop(store);
        self.forget(node, ticket);
        attached
    }
}

/// Listing path of a directory node: always ends with `/`.
fn directory_path(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RequestCounters;
    use crate::test_support::ScriptedSource;
    use crate::tree::{FetchState, ViewState};

    fn source() -> ScriptedSource {
        ScriptedSource::new("p")
            .listing("/", &["a/"])
            .listing("/a/", &["b/", "d.txt"])
            .listing("/a/b/", &["c.txt"])
    }

    mod expansion_tests {
        use super::*;

        #[tokio::test]
        async fn shared_prefix_is_fetched_once() {
            let expander = TreeExpander::new("p", source());
            let report = expander.expand(["/a/b/c.txt", "/a/d.txt"]).await;

            assert!(report.is_complete(), "failures: {:?}", report.failures);
            assert_eq!(expander.source().total_calls(), 3);
            assert_eq!(expander.source().call_count("/a/"), 1);

            expander.with_store(|store| {
                let c = report.node_for("/a/b/c.txt").unwrap();
                assert_eq!(store.node(c).unwrap().path(), "/a/b/c.txt");
                let d = report.node_for("/a/d.txt").unwrap();
                assert_eq!(store.node(d).unwrap().path(), "/a/d.txt");
            });
        }

        #[tokio::test]
        async fn repeated_expansion_does_not_refetch() {
            let expander = TreeExpander::new("p", source());
            let first = expander.expand_path("/a/b/c.txt").await.unwrap();
            let second = expander.expand_path("/a/b/c.txt").await.unwrap();
            assert_eq!(first, second);
            assert_eq!(expander.source().calls(), vec!["/", "/a/", "/a/b/"]);
        }

        #[tokio::test]
        async fn directories_on_the_way_are_expanded() {
            let expander = TreeExpander::new("p", source());
            expander.expand_path("/a/b/c.txt").await.unwrap();
            expander.with_store(|store| {
                for path in ["/", "/a/", "/a/b/"] {
                    let id = store.find_by_path(path).unwrap();
                    let node = store.node(id).unwrap();
                    assert_eq!(node.state(), FetchState::Fetched, "{}", path);
                    assert_eq!(node.view(), ViewState::Expanded, "{}", path);
                }
            });
        }

        #[tokio::test]
        async fn trailing_slash_names_the_directory() {
            let expander = TreeExpander::new("p", source());
            let node = expander.expand_path("/a/b/").await.unwrap();
            expander.with_store(|store| {
                assert_eq!(store.node(node).unwrap().name(), "b");
                assert!(store.node(node).unwrap().is_fetched());
            });
            let root = expander.expand_path("/").await.unwrap();
            assert_eq!(root, expander.with_store(TreeStore::root));
        }

        #[tokio::test]
        async fn relative_target_is_rejected() {
            let expander = TreeExpander::new("p", source());
            let err = expander.expand_path("a/b").await.unwrap_err();
            assert!(matches!(err, ExpandError::InvalidTarget { .. }));
            assert_eq!(expander.source().total_calls(), 0);
        }
    }

    mod failure_tests {
        use super::*;

        #[tokio::test]
        async fn ambiguous_child_only_fails_its_branch() {
            let source = ScriptedSource::new("p")
                .listing("/", &["a/"])
                .listing("/a/", &["b/", "b/", "d.txt"]);
            let expander = TreeExpander::new("p", source);
            let report = expander.expand(["/a/b/x.txt", "/a/d.txt"]).await;

            assert_eq!(
                report.failure_for("/a/b/x.txt"),
                Some(&ExpandError::AmbiguousChild {
                    path: "/a/b/x.txt".to_string(),
                    component: "b".to_string(),
                    count: 2,
                })
            );
            assert!(report.node_for("/a/d.txt").is_some());
        }

        #[tokio::test]
        async fn missing_child_only_fails_its_branch() {
            let expander = TreeExpander::new("p", source());
            let report = expander.expand(["/a/zzz/q.txt", "/a/b/c.txt"]).await;
            assert!(matches!(
                report.failure_for("/a/zzz/q.txt"),
                Some(ExpandError::NoMatchingChild { component, .. }) if component == "zzz"
            ));
            assert!(report.node_for("/a/b/c.txt").is_some());
        }

        #[tokio::test]
        async fn missing_leaf_is_reported() {
            let expander = TreeExpander::new("p", source());
            let err = expander.expand_path("/a/nope.txt").await.unwrap_err();
            assert!(matches!(err, ExpandError::NoMatchingChild { .. }));
        }

        #[tokio::test]
        async fn fetch_failure_leaves_node_unfetched_for_retry() {
            let source = source().fail("/a/");
            let counters = Arc::new(RequestCounters::new());
            let expander = TreeExpander::new("p", source).with_observer(counters.clone());

            let err = expander.expand_path("/a/d.txt").await.unwrap_err();
            assert!(matches!(err, ExpandError::FetchFailed { ref path, .. } if path == "/a/"));
            expander.with_store(|store| {
                let a = store.find_by_path("/a/").unwrap();
                assert_eq!(store.node(a).unwrap().state(), FetchState::Unfetched);
            });
            assert_eq!(counters.snapshot().fetch_failures, 1);

            expander.source().recover("/a/");
            expander.expand_path("/a/d.txt").await.unwrap();
            assert_eq!(expander.source().call_count("/a/"), 2);
            assert_eq!(expander.source().call_count("/"), 1);
        }
    }

    mod concurrency_tests {
        use super::*;

        #[tokio::test]
        async fn waiters_share_an_in_flight_fetch() {
            let source = source().gated();
            let counters = Arc::new(RequestCounters::new());
            let expander = TreeExpander::new("p", source).with_observer(counters.clone());

            let expand = expander.expand(["/a/b/c.txt", "/a/d.txt", "/a/"]);
            let open = async {
                tokio::task::yield_now().await;
                expander.source().open_gate();
            };
            let (report, ()) = tokio::join!(expand, open);

            assert!(report.is_complete(), "failures: {:?}", report.failures);
            assert_eq!(expander.source().call_count("/"), 1);
            assert_eq!(expander.source().call_count("/a/"), 1);
            assert_eq!(expander.source().total_calls(), 3);
            assert!(counters.snapshot().shared_fetches >= 2);
        }

        #[tokio::test]
        async fn waiters_receive_the_fetch_failure() {
            let source = source().fail("/").gated();
            let expander = TreeExpander::new("p", source);

            let expand = expander.expand(["/a/b/c.txt", "/a/d.txt"]);
            let open = async {
                tokio::task::yield_now().await;
                expander.source().open_gate();
            };
            let (report, ()) = tokio::join!(expand, open);

            assert_eq!(report.failures.len(), 2);
            assert_eq!(expander.source().call_count("/"), 1);
        }

        #[tokio::test]
        async fn dropped_fetcher_is_taken_over() {
            let expander = TreeExpander::new("p", source().gated());
            {
                // Start a fetch of "/" and abandon it while it is in flight.
                let abandoned = expander.expand_path("/a/");
                tokio::pin!(abandoned);
                let poll = futures::poll!(abandoned.as_mut());
                assert!(poll.is_pending());
            }
            expander.source().open_gate();
            expander.expand_path("/a/d.txt").await.unwrap();
            assert_eq!(expander.source().call_count("/"), 2);
        }
    }

    mod project_tests {
        use super::*;

        #[tokio::test]
        async fn switch_project_discards_tree() {
            let expander = TreeExpander::new("p", source());
            let old = expander.expand_path("/a/d.txt").await.unwrap();
            expander.switch_project("other");
            assert_eq!(expander.project(), "other");
            expander.with_store(|store| {
                assert!(store.node(old).is_none());
                assert_eq!(store.len(), 1);
            });
        }

        #[tokio::test]
        async fn expand_node_fetches_one_level() {
            let expander = TreeExpander::new("p", source());
            let root = expander.with_store(TreeStore::root);
            expander.expand_node(root).await.unwrap();
            let a = expander.with_store(|s| s.children_named(root, "a")[0]);
            expander.expand_node(a).await.unwrap();
            expander.collapse(a);
            expander.expand_node(a).await.unwrap();

            assert_eq!(expander.source().calls(), vec!["/", "/a/"]);
            expander.with_store(|store| {
                assert!(store.node(a).unwrap().is_expanded());
                assert_eq!(store.node(a).unwrap().children().unwrap().len(), 2);
            });
        }

        #[tokio::test]
        async fn expand_node_rejects_files() {
            let expander = TreeExpander::new("p", source());
            expander.expand_path("/a/d.txt").await.unwrap();
            let file = expander.with_store(|s| s.find_by_path("/a/d.txt")).unwrap();

            let err = expander.expand_node(file).await.unwrap_err();
            assert_eq!(
                err,
                ExpandError::InvalidTarget {
                    target: "/a/d.txt".to_string()
                }
            );
            assert_eq!(expander.source().call_count("/a/d.txt/"), 0);
            expander.with_store(|store| {
                assert!(!store.node(file).unwrap().is_expanded());
            });
        }
    }
}
