//! # Upload Targets
//!
//! An [`UploadTarget`] names where content goes, how long it is, and how it
//! is cut into blocks. It is immutable for the duration of one upload.
//!
//! ## Block Layout
//!
//! Blocks start at fixed offsets `i * block_size`. Every block is full-sized
//! except the last, which holds `size mod block_size` bytes (or a full block
//! when the size is an exact multiple). Zero-length content has zero blocks.

use serde::{Deserialize, Serialize};

use crate::error::SizeError;

/// Block size mandated by the remote: exactly 4 MiB.
///
/// The remote rejects precreate requests whose block list was computed with
/// any other size.
pub const BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// What the remote should do when the target path already exists.
///
/// Maps onto the remote `rtype` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Reject the upload if the path exists (`rtype=0`).
    Fail,
    /// Let the remote choose a fresh name on conflict (`rtype=1`).
    Rename,
    /// Replace the existing file (`rtype=3`).
    Overwrite,
}

impl ConflictPolicy {
    /// Policy for a plain overwrite-intent flag.
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            Self::Overwrite
        } else {
            Self::Fail
        }
    }

    /// The remote `rtype` code for this policy.
    pub fn rtype(self) -> u8 {
        match self {
            Self::Fail => 0,
            Self::Rename => 1,
            Self::Overwrite => 3,
        }
    }
}

/// Destination and shape of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    path: String,
    size: u64,
    block_size: u64,
    conflict: ConflictPolicy,
}

impl UploadTarget {
    /// Create a target for `path` with a caller-declared size.
    ///
    /// The size is taken as `i64` because callers commonly signal "unknown
    /// length" with a negative value; such targets are rejected with
    /// [`SizeError::Negative`]. The conflict policy defaults to
    /// [`ConflictPolicy::Fail`].
    pub fn new(path: impl Into<String>, declared_size: i64) -> Result<Self, SizeError> {
        let size = u64::try_from(declared_size).map_err(|_| SizeError::Negative(declared_size))?;
        Ok(Self {
            path: path.into(),
            size,
            block_size: BLOCK_SIZE,
            conflict: ConflictPolicy::Fail,
        })
    }

    /// Set the overwrite intent.
    pub fn overwrite(self, overwrite: bool) -> Self {
        self.with_conflict(ConflictPolicy::from_overwrite(overwrite))
    }

    /// Set an explicit conflict policy.
    pub fn with_conflict(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    /// Override the block size.
    ///
    /// The remote only accepts [`BLOCK_SIZE`]; other sizes are useful for
    /// offline digesting. A zero block size is clamped to one byte.
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Remote path as given by the caller.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declared total size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Conflict policy sent to the remote.
    pub fn conflict(&self) -> ConflictPolicy {
        self.conflict
    }

    /// Number of blocks: `ceil(size / block_size)`, zero for empty content.
    pub fn block_count(&self) -> usize {
        self.size.div_ceil(self.block_size) as usize
    }

    /// Byte offset of block `index`.
    pub fn block_offset(&self, index: usize) -> u64 {
        index as u64 * self.block_size
    }

    /// Length in bytes of block `index`, or `None` if out of range.
    pub fn block_len(&self, index: usize) -> Option<u64> {
        if index >= self.block_count() {
            return None;
        }
        let offset = self.block_offset(index);
        Some((self.size - offset).min(self.block_size))
    }
}
