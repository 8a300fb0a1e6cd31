//! drift-chunks: decides how an encrypted payload travels to storage
//!
//! # Overview
//! - `planner`: single request below the part size, otherwise fixed 10 MiB
//!   parts with 1-based contiguous part numbers

pub mod planner;

pub use planner::{check_size, plan, plan_with_part_size, PartSpan, UploadPlan};
