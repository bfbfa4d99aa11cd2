//! # Committed Files
//!
//! The only externally visible result of a successful upload: the file
//! record the remote materialized when the upload was finalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durable, listable file on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedFile {
    /// Remote file identifier (`fs_id`).
    pub fs_id: u64,
    /// Absolute remote path. May differ from the requested path when the
    /// remote renamed the file on conflict.
    pub path: String,
    /// Final path component as stored by the remote.
    pub server_filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Content hash reported by the remote.
    pub md5: String,
    /// Remote media category code.
    pub category: u32,
    /// Server-side creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Server-side modification time.
    pub modified_at: Option<DateTime<Utc>>,
}

impl CommittedFile {
    /// Convert a Unix timestamp in seconds. Zero and out-of-range values
    /// mean "not reported".
    pub fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
        if secs <= 0 {
            return None;
        }
        DateTime::from_timestamp(secs, 0)
    }
}
