//! Filesystem-backed code search backend.
//!
//! [`LocalProject`] serves one directory as a project: directory listings,
//! file text with usages read from a JSON sidecar next to each file,
//! file-name completion, plain substring search, and declared types read
//! from a second sidecar.
//!
//! ## Paths
//!
//! Project paths start with `/` and use `/` separators. Directory paths in
//! listings end with `/`. Hidden entries (names starting with `.`) and
//! sidecars never appear in listings, completion or search.
//!
//! ## Sidecars
//!
//! - `File.java.usages.json`: the usages of `File.java`
//! - `File.java.types.json`: the types `File.java` declares, which also
//!   answer entity lookups
//!
//! ## File Ids
//!
//! A file id is the first eight bytes of the SHA-256 of `project:path`, so it
//! is stable across runs and machines.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::PolarisConfig;
use crate::error::{PolarisError, PolarisResult};
use crate::expand::DirectorySource;
use crate::outline::{find_declaration, TypeInfo};
use crate::position::Span;
use crate::service::{
    CodeSearch, CompleteResponse, CompletionHit, HitKind, SearchHit, SearchResponse,
    SourceResponse, SourceSelector,
};
use crate::text::{base_name, offset_to_position};
use crate::types::{EntityRef, FileHandle, FileId, FileKind, JumpTarget, Usage};

/// Stable id of `path` within `project`.
pub fn file_id(project: &str, path: &str) -> FileId {
    let mut hasher = Sha256::new();
    hasher.update(project.as_bytes());
    hasher.update(b":");
    hasher.update(path.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    FileId(u64::from_be_bytes(bytes))
}

/// Default suffix of the declared-types sidecar.
pub const DEFAULT_TYPES_SUFFIX: &str = ".types.json";

/// A project served from a local directory.
#[derive(Debug, Clone)]
pub struct LocalProject {
    project: String,
    root: PathBuf,
    usages_suffix: String,
    types_suffix: String,
}

/// A regular file found by a walk: its project path and its location on disk.
#[derive(Debug, Clone)]
struct WalkedFile {
    path: String,
    full_path: PathBuf,
}

impl LocalProject {
    pub fn new(
        project: impl Into<String>,
        root: impl Into<PathBuf>,
        usages_suffix: impl Into<String>,
    ) -> Self {
        LocalProject {
            project: project.into(),
            root: root.into(),
            usages_suffix: usages_suffix.into(),
            types_suffix: DEFAULT_TYPES_SUFFIX.to_string(),
        }
    }

    pub fn with_types_suffix(mut self, types_suffix: impl Into<String>) -> Self {
        self.types_suffix = types_suffix.into();
        self
    }

    pub fn from_config(config: &PolarisConfig) -> Self {
        Self::new(
            config.project.clone(),
            config.root.clone(),
            config.usages_suffix.clone(),
        )
        .with_types_suffix(config.types_suffix.clone())
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle for a project path.
    pub fn handle(&self, path: &str, kind: FileKind) -> FileHandle {
        FileHandle::new(
            self.project.clone(),
            path,
            file_id(&self.project, path),
            kind,
        )
    }

    fn check_project(&self, project: &str) -> PolarisResult<()> {
        if project == self.project {
            Ok(())
        } else {
            Err(PolarisError::backend(format!("unknown project '{}'", project)))
        }
    }

    /// Map a project path to a location under the root.
    fn resolve(&self, path: &str) -> PolarisResult<PathBuf> {
        let Some(relative) = path.strip_prefix('/') else {
            return Err(PolarisError::invalid_args(format!(
                "path must start with '/': {}",
                path
            )));
        };
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(PolarisError::invalid_args(format!(
                "path must not contain '.', '..' or a root: {}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }

    fn sidecar_suffixes(&self) -> [String; 2] {
        [self.usages_suffix.clone(), self.types_suffix.clone()]
    }

    /// Every listed regular file under the root, sorted by path.
    async fn walk(&self) -> PolarisResult<Vec<WalkedFile>> {
        let root = self.root.clone();
        let suffixes = self.sidecar_suffixes();
        tokio::task::spawn_blocking(move || walk_files(&root, &suffixes))
            .await
            .map_err(|e| PolarisError::internal(format!("file walk panicked: {}", e)))?
    }

    async fn find_by_id(&self, id: FileId) -> PolarisResult<String> {
        self.walk()
            .await?
            .into_iter()
            .map(|file| file.path)
            .find(|path| file_id(&self.project, path) == id)
            .ok_or_else(|| PolarisError::file_not_found(format!("file #{}", id)))
    }

    async fn read_usages(&self, full_path: &Path, path: &str) -> PolarisResult<Vec<Usage>> {
        read_sidecar(full_path, &self.usages_suffix, path, "usages").await
    }

    async fn read_types(&self, full_path: &Path, path: &str) -> PolarisResult<Vec<TypeInfo>> {
        read_sidecar(full_path, &self.types_suffix, path, "types").await
    }
}

fn is_listed(name: &str, sidecar_suffixes: &[String]) -> bool {
    !name.starts_with('.') && !sidecar_suffixes.iter().any(|s| name.ends_with(s.as_str()))
}

/// JSON array stored next to `full_path`; a missing sidecar is empty.
async fn read_sidecar<T>(
    full_path: &Path,
    suffix: &str,
    path: &str,
    what: &str,
) -> PolarisResult<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    let mut sidecar = full_path.as_os_str().to_os_string();
    sidecar.push(suffix);
    let sidecar = PathBuf::from(sidecar);
    let text = match tokio::fs::read_to_string(&sidecar).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path, what, "no sidecar");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&text)
        .map_err(|e| PolarisError::invalid_args(format!("malformed {} for {}: {}", what, path, e)))
}

fn walk_files(root: &Path, sidecar_suffixes: &[String]) -> PolarisResult<Vec<WalkedFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || is_listed(&e.file_name().to_string_lossy(), sidecar_suffixes)
        })
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");
        files.push(WalkedFile {
            path: format!("/{}", relative),
            full_path: entry.path().to_path_buf(),
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn not_found_or(err: std::io::Error, path: &str) -> PolarisError {
    if err.kind() == std::io::ErrorKind::NotFound {
        PolarisError::file_not_found(path)
    } else {
        PolarisError::backend(format!("{}: {}", path, err))
    }
}

#[async_trait]
impl DirectorySource for LocalProject {
    async fn list_children(
        &self,
        project: &str,
        directory: &str,
    ) -> PolarisResult<Vec<FileHandle>> {
        self.check_project(project)?;
        let directory = if directory.ends_with('/') {
            directory.to_string()
        } else {
            format!("{}/", directory)
        };
        let dir = self.resolve(&directory)?;

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| not_found_or(e, &directory))?;
        let sidecars = self.sidecar_suffixes();
        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| not_found_or(e, &directory))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_listed(&name, &sidecars) {
                continue;
            }
            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(name = %name, error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if metadata.is_dir() {
                let path = format!("{}{}/", directory, name);
                children.push(self.handle(&path, FileKind::Directory));
            } else if metadata.is_file() {
                let path = format!("{}{}", directory, name);
                children.push(self.handle(&path, FileKind::NormalFile));
            }
        }
        children.sort_by(|a, b| a.display_cmp(b));
        debug!(path = %directory, children = children.len(), "listed directory");
        Ok(children)
    }
}

#[async_trait]
impl CodeSearch for LocalProject {
    async fn read_source(&self, selector: &SourceSelector) -> PolarisResult<SourceResponse> {
        let path = match selector {
            SourceSelector::ById(id) => self.find_by_id(*id).await?,
            SourceSelector::ByPath { project, path } => {
                self.check_project(project)?;
                path.clone()
            }
        };
        let full_path = self.resolve(&path)?;
        let source = tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|e| not_found_or(e, &path))?;
        let usages = self.read_usages(&full_path, &path).await?;
        Ok(SourceResponse {
            handle: self.handle(&path, FileKind::NormalFile),
            source,
            usages,
        })
    }

    async fn complete(&self, query: &str, limit: usize) -> PolarisResult<CompleteResponse> {
        let needle = query.to_lowercase();
        let mut matches: Vec<String> = self
            .walk()
            .await?
            .into_iter()
            .map(|file| file.path)
            .filter(|path| base_name(path).to_lowercase().starts_with(&needle))
            .collect();
        // Shortest names first: closest to what was typed.
        matches.sort_by(|a, b| {
            base_name(a)
                .len()
                .cmp(&base_name(b).len())
                .then_with(|| a.cmp(b))
        });
        matches.truncate(limit);

        let hits = matches
            .into_iter()
            .map(|path| CompletionHit {
                kind: HitKind::File,
                name: base_name(&path).to_string(),
                jump_target: JumpTarget::new(self.handle(&path, FileKind::NormalFile), None),
                summary: Some(path),
                use_count: 0,
            })
            .collect();
        Ok(CompleteResponse { hits })
    }

    async fn search(
        &self,
        query: &str,
        rank_from: usize,
        rank_to: usize,
    ) -> PolarisResult<SearchResponse> {
        if query.is_empty() {
            return Err(PolarisError::invalid_args("search query must not be empty"));
        }
        let files = self.walk().await?;
        let query_owned = query.to_string();
        let found = tokio::task::spawn_blocking(move || scan_files(files, &query_owned))
            .await
            .map_err(|e| PolarisError::internal(format!("search panicked: {}", e)))?;

        let count = found.len();
        let hits = found
            .into_iter()
            .skip(rank_from)
            .take(rank_to.saturating_sub(rank_from))
            .map(|m| SearchHit {
                jump_target: JumpTarget::new(
                    self.handle(&m.path, FileKind::NormalFile),
                    Some(Span::on_line(m.line, m.column, m.column + m.width)),
                ),
                summary: m.summary,
                score: m.score,
            })
            .collect();
        Ok(SearchResponse { hits, count })
    }

    async fn resolve_entity(&self, entity: EntityRef) -> PolarisResult<JumpTarget> {
        for file in self.walk().await? {
            let types = self.read_types(&file.full_path, &file.path).await?;
            if let Some(target) = find_declaration(&types, entity) {
                debug!(kind = %entity.kind, id = %entity.id, path = %file.path, "resolved entity");
                return Ok(target.clone());
            }
        }
        Err(PolarisError::entity_not_found(entity))
    }

    async fn list_types_in_file(&self, file: FileId) -> PolarisResult<Vec<TypeInfo>> {
        let path = self.find_by_id(file).await?;
        let full_path = self.resolve(&path)?;
        self.read_types(&full_path, &path).await
    }
}

/// First match of a query in one file.
#[derive(Debug)]
struct FileMatch {
    path: String,
    line: u32,
    column: u32,
    width: u32,
    summary: String,
    score: u32,
}

/// Files containing `query`, most matching lines first.
fn scan_files(files: Vec<WalkedFile>, query: &str) -> Vec<FileMatch> {
    let width = query.chars().count() as u32;
    let mut found = Vec::new();
    for file in files {
        // Binary and non-UTF-8 files are not searchable.
        let Ok(text) = std::fs::read_to_string(&file.full_path) else {
            continue;
        };
        let mut first: Option<(u32, u32, String)> = None;
        let mut score = 0u32;
        for (line, content) in text.lines().enumerate() {
            if let Some(offset) = content.find(query) {
                score += 1;
                if first.is_none() {
                    let column = offset_to_position(content, offset).column;
                    first = Some((line as u32, column, content.trim().to_string()));
                }
            }
        }
        if let Some((line, column, summary)) = first {
            found.push(FileMatch {
                path: file.path,
                line,
                column,
                width,
                summary,
                score,
            });
        }
    }
    found.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    found
}

// ============================================================================
// Tests
// ============================================================================
