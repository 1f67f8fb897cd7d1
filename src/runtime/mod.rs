//! Support code for generated `write_json` methods.
//!
//! Generated files reference this module by path (`::json_writegen::runtime`
//! by default). Nothing here depends on the codegen half of the crate, so a
//! consumer can build with `default-features = false`.
pub mod escape;
pub mod number;
pub mod pool;

pub use escape::{write_str, write_utf8_lossy};
pub use number::{
    write_bool, write_f32, write_f64, write_i64, write_i128, write_timestamp, write_u64,
    write_u128,
};
pub use pool::{BufferPool, PoolCapacity, PoolConfig, PoolStats, PooledBuffer};

/// Literal written for nil pointers and non-finite floats.
pub const NULL: &[u8] = b"null";
