//! Data model shared by the annotator, tree and backend contract.
//!
//! Wire names follow the index backend: enum values are
//! `SCREAMING_SNAKE_CASE`, field names are camelCase.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::position::Span;
use crate::text::base_name;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque identifier of a file in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a declared type, method or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Files
// ============================================================================

/// Kind of a file system entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileKind {
    Directory,
    NormalFile,
}

impl FileKind {
    /// Rank used by the display order: directories come first.
    fn display_rank(self) -> u8 {
        match self {
            FileKind::Directory => 0,
            FileKind::NormalFile => 1,
        }
    }
}

/// A file or directory known to the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    pub project: String,
    /// Project-relative path starting with `/`. Directories may end with `/`.
    pub path: String,
    pub id: FileId,
    pub kind: FileKind,
}

impl FileHandle {
    pub fn new(
        project: impl Into<String>,
        path: impl Into<String>,
        id: FileId,
        kind: FileKind,
    ) -> Self {
        FileHandle {
            project: project.into(),
            path: path.into(),
            id,
            kind,
        }
    }

    /// Name shown in the tree: last path component.
    pub fn name(&self) -> &str {
        base_name(&self.path)
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Reference display order: directories before files, then by project,
    /// then by path.
    pub fn display_cmp(&self, other: &FileHandle) -> Ordering {
        self.kind
            .display_rank()
            .cmp(&other.kind.display_rank())
            .then_with(|| self.project.cmp(&other.project))
            .then_with(|| self.path.cmp(&other.path))
    }
}

/// A navigable location: a file plus an optional span (`None` = top of file).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JumpTarget {
    pub file: FileHandle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl JumpTarget {
    pub fn new(file: FileHandle, span: Option<Span>) -> Self {
        JumpTarget { file, span }
    }

    /// Line to scroll to, if the target names a span.
    pub fn line(&self) -> Option<u32> {
        self.span.map(|span| span.from.line)
    }
}

// ============================================================================
// Usages
// ============================================================================

/// What a usage refers to.
///
/// Kinds this client does not know deserialize to [`UsageKind::Unknown`] so the
/// annotator can reject or demote them instead of failing the whole payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageKind {
    Type,
    Method,
    Variable,
    #[serde(other)]
    Unknown,
}

impl UsageKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            UsageKind::Type => "TYPE",
            UsageKind::Method => "METHOD",
            UsageKind::Variable => "VARIABLE",
            UsageKind::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(self) -> bool {
        self != UsageKind::Unknown
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of a "find usages" query: which kind of entity, and which one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: UsageKind,
    pub id: EntityId,
}

/// A reference to a declared entity occurring at a span of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub span: Span,
    pub kind: UsageKind,
    /// `None` for an unresolved reference, rendered without a link.
    #[serde(default)]
    pub entity_id: Option<EntityId>,
    pub jump_target: JumpTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_jump_target: Option<JumpTarget>,
}

impl Usage {
    pub fn is_resolved(&self) -> bool {
        self.entity_id.is_some()
    }

    /// The entity this usage links to, if it is resolved and of a known kind.
    pub fn entity(&self) -> Option<EntityRef> {
        if !self.kind.is_known() {
            return None;
        }
        self.entity_id.map(|id| EntityRef {
            kind: self.kind,
            id,
        })
    }

    /// Where "go to definition" navigates: the definition when known,
    /// otherwise the usage's own jump target.
    pub fn navigation_target(&self) -> &JumpTarget {
        self.definition_jump_target
            .as_ref()
            .unwrap_or(&self.jump_target)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    fn handle(path: &str, kind: FileKind) -> FileHandle {
        FileHandle::new("proj", path, FileId(1), kind)
    }

    mod file_tests {
        use super::*;

        #[test]
        fn display_order_puts_directories_first() {
            let mut handles = vec![
                handle("/b.txt", FileKind::NormalFile),
                handle("/z/", FileKind::Directory),
                handle("/a.txt", FileKind::NormalFile),
                handle("/c/", FileKind::Directory),
            ];
            handles.sort_by(|a, b| a.display_cmp(b));
            let paths: Vec<_> = handles.iter().map(|h| h.path.as_str()).collect();
            assert_eq!(paths, vec!["/c/", "/z/", "/a.txt", "/b.txt"]);
        }

        #[test]
        fn display_order_compares_project_before_path() {
            let a = FileHandle::new("alpha", "/z.txt", FileId(1), FileKind::NormalFile);
            let b = FileHandle::new("beta", "/a.txt", FileId(2), FileKind::NormalFile);
            assert_eq!(a.display_cmp(&b), Ordering::Less);
        }

        #[test]
        fn name_is_base_name() {
            assert_eq!(handle("/src/main/", FileKind::Directory).name(), "main");
            assert_eq!(handle("/src/Foo.java", FileKind::NormalFile).name(), "Foo.java");
        }

        #[test]
        fn file_kind_wire_names() {
            let json = serde_json::to_string(&handle("/a/", FileKind::Directory)).unwrap();
            assert!(json.contains(r#""kind":"DIRECTORY""#));
            let json = serde_json::to_string(&FileKind::NormalFile).unwrap();
            assert_eq!(json, r#""NORMAL_FILE""#);
        }
    }

    mod usage_tests {
        use super::*;

        fn usage_json(kind: &str, entity: &str) -> String {
            format!(
                r#"{{"span":{{"from":{{"line":0,"column":8}},"to":{{"line":0,"column":11}}}},
                    "kind":"{}","entityId":{},
                    "jumpTarget":{{"file":{{"project":"p","path":"/Foo.java","id":7,"kind":"NORMAL_FILE"}}}}}}"#,
                kind, entity
            )
        }

        #[test]
        fn deserializes_camel_case_fields() {
            let usage: Usage = serde_json::from_str(&usage_json("TYPE", "42")).unwrap();
            assert_eq!(usage.kind, UsageKind::Type);
            assert_eq!(usage.entity_id, Some(EntityId(42)));
            assert_eq!(usage.span.from, Position::new(0, 8));
            assert_eq!(usage.jump_target.span, None);
            assert!(usage.definition_jump_target.is_none());
        }

        #[test]
        fn unknown_kind_deserializes_to_unknown() {
            let usage: Usage = serde_json::from_str(&usage_json("PACKAGE", "3")).unwrap();
            assert_eq!(usage.kind, UsageKind::Unknown);
            assert_eq!(usage.entity(), None);
        }

        #[test]
        fn null_entity_is_unresolved() {
            let usage: Usage = serde_json::from_str(&usage_json("METHOD", "null")).unwrap();
            assert!(!usage.is_resolved());
            assert_eq!(usage.entity(), None);
        }

        #[test]
        fn entity_ref_carries_kind() {
            let usage: Usage = serde_json::from_str(&usage_json("VARIABLE", "9")).unwrap();
            assert_eq!(
                usage.entity(),
                Some(EntityRef {
                    kind: UsageKind::Variable,
                    id: EntityId(9)
                })
            );
        }

        #[test]
        fn navigation_prefers_definition() {
            let mut usage: Usage = serde_json::from_str(&usage_json("TYPE", "1")).unwrap();
            assert_eq!(usage.navigation_target().file.path, "/Foo.java");
            let def = JumpTarget::new(
                handle("/Def.java", FileKind::NormalFile),
                Some(Span::on_line(4, 0, 3)),
            );
            usage.definition_jump_target = Some(def);
            assert_eq!(usage.navigation_target().file.path, "/Def.java");
            assert_eq!(usage.navigation_target().line(), Some(4));
        }
    }
}
