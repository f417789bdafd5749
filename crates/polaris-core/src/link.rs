//! Navigation URLs and path bar breadcrumbs.

use serde::Serialize;

use crate::error::{PolarisError, PolarisResult};
use crate::types::{FileId, JumpTarget};

/// Join a project name and a project path with exactly one `/`.
fn join(project: &str, path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}/{}", project, path)
}

/// `{project}/{path}`, plus `?line={line}` when the target names a span.
pub fn source_url(target: &JumpTarget) -> String {
    let base = join(&target.file.project, &target.file.path);
    match target.line() {
        Some(line) => format!("{}?line={}", base, line),
        None => base,
    }
}

/// URL of a file addressed by id.
pub fn source_url_by_id(id: FileId) -> String {
    format!("source?file={}", id)
}

/// URL of a directory (or file) of a project.
pub fn file_url(project: &str, path: &str) -> String {
    join(project, path)
}

/// One breadcrumb of the path bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "part", rename_all = "lowercase")]
pub enum PathPart {
    Link { name: String, url: String },
    Divider,
    Active { name: String },
}

/// Breadcrumbs for `path` in `project`: the project and each enclosing
/// directory as links, separated by dividers, ending with the current entry.
///
/// Empty components are skipped, so a trailing `/` or a doubled `//` adds
/// nothing and a directory path ends with that directory.
pub fn path_bar(project: &str, path: &str) -> PolarisResult<Vec<PathPart>> {
    if !path.starts_with('/') {
        return Err(PolarisError::invalid_args(format!(
            "path must start with '/': {}",
            path
        )));
    }
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let Some((current, directories)) = components.split_last() else {
        return Ok(vec![PathPart::Active {
            name: project.to_string(),
        }]);
    };

    let mut parts = vec![
        PathPart::Link {
            name: project.to_string(),
            url: file_url(project, "/"),
        },
        PathPart::Divider,
    ];
    let mut prefix = String::from("/");
    for name in directories {
        prefix.push_str(name);
        prefix.push('/');
        parts.push(PathPart::Link {
            name: name.to_string(),
            url: file_url(project, &prefix),
        });
        parts.push(PathPart::Divider);
    }
    parts.push(PathPart::Active {
        name: current.to_string(),
    });
    Ok(parts)
}
