//! Ahead-of-time JSON encoders for the structs of a Rust module.
//!
//! The `codegen` half reads a module with `syn`, builds a type catalog,
//! lowers each entry into an encoder plan and writes `gen_json.rs`, which
//! the module pulls in with `include!`. The generated code only needs
//! [`runtime`], which is always compiled.
pub mod runtime;

#[cfg(feature = "codegen")]
pub mod catalog;
#[cfg(feature = "codegen")]
pub mod descriptor;
#[cfg(feature = "codegen")]
pub mod emit;
#[cfg(feature = "codegen")]
pub mod error;
#[cfg(feature = "codegen")]
pub mod generate;
#[cfg(feature = "codegen")]
pub mod options;
#[cfg(feature = "codegen")]
pub mod plan;
#[cfg(feature = "codegen")]
pub mod tags;

#[cfg(feature = "codegen")]
pub use catalog::ModuleRef;
#[cfg(feature = "codegen")]
pub use error::{GenError, TypeDiagnostic};
#[cfg(feature = "codegen")]
pub use generate::{ARTIFACT_NAME, GenerationReport, TypeOutcome, generate, plan_encoders};
#[cfg(feature = "codegen")]
pub use options::{GenerationOptions, VirtualFieldSpec};
