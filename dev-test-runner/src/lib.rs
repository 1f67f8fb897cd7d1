//! Models run through the generator at build time; see `build.rs`.
pub mod models;
