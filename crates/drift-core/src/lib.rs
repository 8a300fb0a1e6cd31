pub mod config;
pub mod error;
pub mod types;

pub use error::{DriftError, DriftResult};

/// Payloads at or above this size are split into parts of exactly this size.
pub const PART_SIZE: u64 = 10 * 1024 * 1024;

/// Largest plaintext the front ends will hand to the core (1 GiB).
pub const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;
