//! Generation options, their defaults, and loading them from TOML or JSON.
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::runtime::pool::{DEFAULT_BUFFER_SIZE, PoolCapacity, PoolConfig};

pub const DEFAULT_RUNTIME_PATH: &str = "::json_writegen::runtime";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Options for one generation run. Absent keys take the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationOptions {
    /// Also emit `marshal_json`, returning the encoding as `Vec<u8>`.
    pub marshal_json: bool,
    /// Capacity of freshly allocated buffers; 0 means 8 KiB.
    pub buffer_size: usize,
    /// Buffers that grow past this are not reused. Never below `buffer_size`.
    pub max_buffer_size: usize,
    /// Idle buffers kept by the pool. 0 means one per CPU, negative disables pooling.
    pub buffer_count: i64,
    /// When non-zero, overrides `buffer_count` with `cpus * buffers_per_proc`.
    pub buffers_per_proc: usize,
    /// Virtual fields keyed by the bare type name (`Person`, not `models::Person`).
    pub methods: IndexMap<String, Vec<VirtualFieldSpec>>,
    /// Only types whose name matches this regex are generated.
    pub include: Option<String>,
    /// Types whose name matches this regex are skipped, even if included.
    pub exclude: Option<String>,
    /// Path generated code uses to reach the runtime module.
    pub runtime_path: Option<String>,
    /// Directory for the artifact instead of the module's own directory.
    pub out_dir: Option<PathBuf>,
}

/// An extra object key whose value comes from a zero-argument method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualFieldSpec {
    /// Method name.
    pub name: String,
    /// Output key.
    pub key: String,
    #[serde(default)]
    pub omit_empty: bool,
}

/// Compiled include/exclude filters over type names.
#[derive(Debug, Clone, Default)]
pub struct TypeFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl GenerationOptions {
    /// Loads options from a `.toml` file, or JSON for any other extension.
    pub fn from_file(path: &Path) -> Result<Self, GenError> {
        let source = std::fs::read_to_string(path).map_err(|source| GenError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&source),
            _ => Self::from_json_str(&source),
        };
        parsed.map_err(|message| GenError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml_str(src: &str) -> Result<Self, String> {
        toml::from_str(src).map_err(|e| e.to_string())
    }

    pub fn from_json_str(src: &str) -> Result<Self, String> {
        from_str_with_path(src)
    }

    /// Pool settings baked into the generated constructor.
    pub fn pool_config(&self) -> PoolConfig {
        let mut buffer_size = DEFAULT_BUFFER_SIZE;
        if self.buffer_size > 0 {
            buffer_size = self.buffer_size;
        }
        let max_buffer_size = self.max_buffer_size.max(buffer_size);
        let capacity = if self.buffers_per_proc > 0 {
            PoolCapacity::PerProc(self.buffers_per_proc)
        } else if self.buffer_count > 0 {
            PoolCapacity::Fixed(self.buffer_count as usize)
        } else if self.buffer_count < 0 {
            PoolCapacity::Disabled
        } else {
            PoolCapacity::PerProc(1)
        };
        PoolConfig {
            buffer_size,
            max_buffer_size,
            capacity,
        }
    }

    pub fn filter(&self) -> Result<TypeFilter, GenError> {
        let compile = |which: &'static str, pattern: &Option<String>| {
            pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|source| GenError::Pattern { which, source })
        };
        Ok(TypeFilter {
            include: compile("include", &self.include)?,
            exclude: compile("exclude", &self.exclude)?,
        })
    }

    pub fn runtime_path(&self) -> Result<syn::Path, GenError> {
        let raw = self.runtime_path.as_deref().unwrap_or(DEFAULT_RUNTIME_PATH);
        syn::parse_str(raw).map_err(|_| GenError::RuntimePath(raw.to_string()))
    }

    pub fn methods_for(&self, type_name: &str) -> &[VirtualFieldSpec] {
        self.methods.get(type_name).map(Vec::as_slice).unwrap_or_default()
    }
}

impl TypeFilter {
    pub fn accepts(&self, type_name: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(type_name) {
                return false;
            }
        }
        self.include.as_ref().is_none_or(|include| include.is_match(type_name))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Deserialize with JSON-path context in error messages.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at JSON path {path} → {}", err.into_inner()))
        }
    }
}
