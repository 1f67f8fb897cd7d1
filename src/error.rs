//! Fatal and per-type failures.
use std::path::PathBuf;

use serde::Serialize;

/// Aborts the whole run; no artifact is written.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("module `{reference}` not found")]
    ModuleNotFound { reference: String },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },
    #[error("invalid {which} pattern: {source}")]
    Pattern {
        which: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("invalid runtime path `{0}`")]
    RuntimePath(String),
    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
    #[error("generated code does not parse: {0}")]
    Render(#[source] syn::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Abandons one catalog entry; the run continues with the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDiagnostic {
    #[error("can't encode `{ty}` in type {type_name}: {reason}")]
    Unsupported {
        type_name: String,
        ty: String,
        reason: String,
    },
    #[error("type {type_name} does not have method {method}")]
    MissingMethod { type_name: String, method: String },
    #[error("method {method} on type {type_name} requires arguments")]
    MethodArguments { type_name: String, method: String },
    #[error("method {method} on type {type_name} can't be called through `&self`")]
    MethodReceiver { type_name: String, method: String },
    #[error("method {method} on type {type_name} must return exactly one value")]
    MethodResults { type_name: String, method: String },
    #[error("type {type_name} delegates to {dependency}, which was not generated")]
    MissingDependency {
        type_name: String,
        dependency: String,
    },
}

impl TypeDiagnostic {
    /// The type named by the diagnostic, which may be nested inside the catalog entry.
    pub fn type_name(&self) -> &str {
        match self {
            TypeDiagnostic::Unsupported { type_name, .. }
            | TypeDiagnostic::MissingMethod { type_name, .. }
            | TypeDiagnostic::MethodArguments { type_name, .. }
            | TypeDiagnostic::MethodReceiver { type_name, .. }
            | TypeDiagnostic::MethodResults { type_name, .. }
            | TypeDiagnostic::MissingDependency { type_name, .. } => type_name,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            TypeDiagnostic::MissingMethod { method, .. }
            | TypeDiagnostic::MethodArguments { method, .. }
            | TypeDiagnostic::MethodReceiver { method, .. }
            | TypeDiagnostic::MethodResults { method, .. } => Some(method),
            _ => None,
        }
    }
}
