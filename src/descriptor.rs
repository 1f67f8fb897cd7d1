//! Immutable type model built from the parsed module.
//!
//! Named types are kept by name and resolved through the catalog on demand,
//! so a self-referential record never turns into an infinite tree.
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    Bool,
    Int { signed: bool, bits: IntBits },
    Float { bits: FloatBits },
    String,
    /// A path to a type declared in the module, or the temporal type.
    Named { path: String },
    /// `Option<T>` is nullable; `Box`, `Rc`, `Arc` and references are not.
    Pointer {
        pointee: Box<TypeDescriptor>,
        nullable: bool,
    },
    Sequence { element: Box<TypeDescriptor> },
    /// Anything else, kept as source text for diagnostics.
    Unsupported { repr: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntBits {
    B8,
    B16,
    B32,
    B64,
    B128,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatBits {
    B32,
    B64,
}

/// A field of a named record, after tag resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    /// Source identifier, unraw (`r#type` → `type`).
    pub name: String,
    /// Whether the identifier was written as `r#name`.
    pub raw: bool,
    /// Output key, or `None` when a skip tag drops the field.
    pub key: Option<String>,
    pub omit_empty: bool,
    pub ty: TypeDescriptor,
}

impl TypeDescriptor {
    pub fn int(signed: bool, bits: IntBits) -> Self {
        TypeDescriptor::Int { signed, bits }
    }

    pub fn named(path: impl Into<String>) -> Self {
        TypeDescriptor::Named { path: path.into() }
    }

    pub fn pointer(pointee: TypeDescriptor, nullable: bool) -> Self {
        TypeDescriptor::Pointer {
            pointee: Box::new(pointee),
            nullable,
        }
    }

    pub fn sequence(element: TypeDescriptor) -> Self {
        TypeDescriptor::Sequence {
            element: Box::new(element),
        }
    }

    pub fn unsupported(repr: impl Into<String>, reason: impl Into<String>) -> Self {
        TypeDescriptor::Unsupported {
            repr: repr.into(),
            reason: reason.into(),
        }
    }
}
