//! Fixed-size upload planning
//!
//! Payloads under the part size go up in one request. At or above it, and
//! only when the caller asks for multipart, the payload is cut into parts of
//! exactly `part_size` bytes; the last part carries the remainder.
//!
//! Planning is pure: same inputs, same plan.

use std::ops::Range;

use drift_core::{DriftError, DriftResult, PART_SIZE};

/// One planned part of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSpan {
    /// 1-based, contiguous, equal to upload order
    pub part_number: u32,
    /// Byte range within the payload
    pub range: Range<u64>,
}

impl PartSpan {
    pub fn len(&self) -> u64 {
        self.range.end - self.range.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The range as `usize` indices into an in-memory payload
    pub fn as_usize_range(&self) -> Range<usize> {
        self.range.start as usize..self.range.end as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPlan {
    Single { size: u64 },
    Multipart { parts: Vec<PartSpan> },
}

impl UploadPlan {
    pub fn is_multipart(&self) -> bool {
        matches!(self, UploadPlan::Multipart { .. })
    }

    /// Number of transfers the plan needs (1 for a single-shot upload)
    pub fn transfer_count(&self) -> usize {
        match self {
            UploadPlan::Single { .. } => 1,
            UploadPlan::Multipart { parts } => parts.len(),
        }
    }
}

/// Plan an upload of `payload_size` bytes with the standard 10 MiB part size.
pub fn plan(payload_size: u64, request_multipart: bool) -> DriftResult<UploadPlan> {
    plan_with_part_size(payload_size, request_multipart, PART_SIZE)
}

/// Plan with an explicit part size.
pub fn plan_with_part_size(
    payload_size: u64,
    request_multipart: bool,
    part_size: u64,
) -> DriftResult<UploadPlan> {
    if payload_size == 0 {
        return Err(DriftError::EmptyPayload);
    }
    if part_size == 0 {
        return Err(DriftError::Config("part size must be non-zero".into()));
    }

    if !request_multipart || payload_size < part_size {
        return Ok(UploadPlan::Single { size: payload_size });
    }

    let count = payload_size.div_ceil(part_size);
    let count = u32::try_from(count).map_err(|_| {
        DriftError::Config(format!("{count} parts exceeds the part number range"))
    })?;

    let parts = (0..count)
        .map(|i| {
            let start = u64::from(i) * part_size;
            PartSpan {
                part_number: i + 1,
                range: start..(start + part_size).min(payload_size),
            }
        })
        .collect();

    Ok(UploadPlan::Multipart { parts })
}

/// Reject payloads above the configured ceiling before any work is done.
pub fn check_size(size: u64, limit: u64) -> DriftResult<()> {
    if size > limit {
        return Err(DriftError::PayloadTooLarge { size, limit });
    }
    Ok(())
}
