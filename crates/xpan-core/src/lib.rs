#![deny(missing_docs)]

//! # xpan-core: Foundational Types for xpan Uploads
//!
//! This crate defines the synchronous, network-free half of the chunked
//! upload protocol. Every other crate in the workspace depends on it. It has
//! no internal crate dependencies and no async runtime. From the ecosystem it
//! uses `serde`, `serde_json`, `thiserror`, `chrono`, `md-5`, `hex`,
//! `tempfile`, `parking_lot` and `tracing`.
//!
//! ## Design Principles
//!
//! 1. **One streaming pass.** [`DigestEngine::digest`] consumes a
//!    non-seekable source exactly once, producing the whole-content hash,
//!    the slice hash and every block hash while retaining the bytes in a
//!    [`ContentBuffer`] for later random-access block slicing.
//!
//! 2. **Block arithmetic lives in one place.** [`UploadTarget`] owns the
//!    block size; `block_count` and `block_len` are the only definitions of
//!    where block boundaries fall.
//!
//! 3. **Size is validated, not trusted.** A declared size that is negative
//!    or disagrees with the bytes actually read is a [`SizeError`].
//!
//! 4. **Structured errors with `thiserror`**: no `Box<dyn Error>`, no
//!    `.unwrap()` outside tests.

pub mod buffer;
pub mod digest;
pub mod error;
pub mod file;
pub mod target;

// Re-export primary types at crate root for ergonomic imports.
pub use buffer::ContentBuffer;
pub use digest::{ContentDigest, DigestEngine, Md5Hex, SLICE_LEN};
pub use error::{CoreError, SizeError};
pub use file::CommittedFile;
pub use target::{ConflictPolicy, UploadTarget, BLOCK_SIZE};
