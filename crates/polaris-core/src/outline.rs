//! Declared types of a file and their outline.
//!
//! [`TypeInfo`] is the backend's answer to "list types in file": each type
//! with its fields and methods, every one carrying its own jump target.
//! [`outline`] projects that into display rows, with package and class
//! qualifiers stripped and JVM special method names translated.

use serde::{Deserialize, Serialize};

use crate::link::source_url;
use crate::text::{member_name, method_display_name, simple_name};
use crate::types::{EntityId, EntityRef, JumpTarget, UsageKind};

// ============================================================================
// Declarations
// ============================================================================

/// A declared class, interface or enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInfo {
    pub id: EntityId,
    /// Qualified name, e.g. `com.acme.App`.
    pub name: String,
    pub jump_target: JumpTarget,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub methods: Vec<MethodInfo>,
}

/// A field; `name` is qualified with its class, e.g. `com.acme.App#count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub id: EntityId,
    pub name: String,
    /// Qualified type name of the field.
    pub type_name: String,
    pub jump_target: JumpTarget,
}

/// A method; `name` is qualified with its class, e.g. `com.acme.App#run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub parameter_types: Vec<String>,
    pub return_type: String,
    pub jump_target: JumpTarget,
}

impl TypeInfo {
    /// Declaration site of `entity` when this type declares it.
    ///
    /// Types answer TYPE entities, their methods METHOD entities and their
    /// fields VARIABLE entities.
    pub fn find(&self, entity: EntityRef) -> Option<&JumpTarget> {
        match entity.kind {
            UsageKind::Type => (self.id == entity.id).then_some(&self.jump_target),
            UsageKind::Method => self
                .methods
                .iter()
                .find(|m| m.id == entity.id)
                .map(|m| &m.jump_target),
            UsageKind::Variable => self
                .fields
                .iter()
                .find(|f| f.id == entity.id)
                .map(|f| &f.jump_target),
            UsageKind::Unknown => None,
        }
    }
}

/// Declaration site of `entity` among `types`.
pub fn find_declaration(types: &[TypeInfo], entity: EntityRef) -> Option<&JumpTarget> {
    types.iter().find_map(|t| t.find(entity))
}

// ============================================================================
// Outline
// ============================================================================

/// One row under a type in the outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineMember {
    pub kind: UsageKind,
    pub id: EntityId,
    pub label: String,
    pub url: String,
}

/// A type row and its members: fields first, then methods, in declaration
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineType {
    pub id: EntityId,
    pub label: String,
    pub url: String,
    pub members: Vec<OutlineMember>,
}

/// `count: int` for a field `a.B#count` of type `int`.
pub fn field_label(field: &FieldInfo) -> String {
    format!(
        "{}: {}",
        member_name(&field.name),
        simple_name(&field.type_name)
    )
}

/// `run(String, int): void`; constructors and static initializers read
/// `constructor(..)` and `static-block(..)`.
pub fn method_label(method: &MethodInfo) -> String {
    let parameters: Vec<&str> = method
        .parameter_types
        .iter()
        .map(|p| simple_name(p))
        .collect();
    format!(
        "{}({}): {}",
        method_display_name(&method.name),
        parameters.join(", "),
        simple_name(&method.return_type)
    )
}

/// Outline rows for the types of one file.
pub fn outline(types: &[TypeInfo]) -> Vec<OutlineType> {
    types
        .iter()
        .map(|t| {
            let fields = t.fields.iter().map(|f| OutlineMember {
                kind: UsageKind::Variable,
                id: f.id,
                label: field_label(f),
                url: source_url(&f.jump_target),
            });
            let methods = t.methods.iter().map(|m| OutlineMember {
                kind: UsageKind::Method,
                id: m.id,
                label: method_label(m),
                url: source_url(&m.jump_target),
            });
            OutlineType {
                id: t.id,
                label: simple_name(&t.name).to_string(),
                url: source_url(&t.jump_target),
                members: fields.chain(methods).collect(),
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
