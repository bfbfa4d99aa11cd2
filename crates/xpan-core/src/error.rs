//! # Error Hierarchy
//!
//! Local precondition failures raised before any remote call is made. These
//! are never retried: re-reading the same source cannot change its length.

use thiserror::Error;

/// Top-level error type for the core crate.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Declared size and the source disagree.
    #[error("size error: {0}")]
    Size(#[from] SizeError),

    /// A block index outside `[0, block_count)` was requested.
    #[error("block {index} out of range (content has {block_count} blocks)")]
    BlockOutOfRange {
        /// The requested block index.
        index: usize,
        /// Number of blocks in the content.
        block_count: usize,
    },

    /// I/O error while reading the source or the spill file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Violations of the declared-size contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    /// The caller declared a negative size (unknown length).
    #[error("cannot upload content with unknown size (declared {0})")]
    Negative(i64),

    /// The source ended before the declared size was reached.
    #[error("short read: declared {declared} bytes but source ended after {read}")]
    ShortRead {
        /// Size the caller declared.
        declared: u64,
        /// Bytes actually read.
        read: u64,
    },

    /// The source produced more bytes than declared.
    #[error("overrun: declared {declared} bytes but source produced more")]
    Overrun {
        /// Size the caller declared.
        declared: u64,
    },
}
