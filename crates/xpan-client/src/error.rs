//! xpan client error types.
//!
//! Every failure an upload can end in is one [`XpanError`] variant. The
//! pacer consults [`XpanError::is_retryable`] and nothing else when deciding
//! whether to try a call again.

use xpan_core::{CoreError, SizeError};

use crate::config::ConfigError;
use crate::credentials::CredentialError;

/// Application error codes the remote uses for transient conditions.
///
/// 31034: "hit frequency limit".
pub const TRANSIENT_REMOTE_CODES: &[i64] = &[31034];

/// A structured rejection from the remote, normalized from either error
/// envelope shape (`errno`/`errmsg` or `error_code`/`error_msg`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// Non-zero application error code.
    pub code: i64,
    /// Human-readable message; synthesized when the remote sends none.
    pub message: String,
    /// Request identifier, if the remote reported one.
    pub request_id: Option<String>,
}

impl RemoteError {
    /// Whether the code is a known transient condition.
    pub fn is_transient(&self) -> bool {
        TRANSIENT_REMOTE_CODES.contains(&self.code)
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error {}: {}", self.code, self.message)?;
        if let Some(id) = &self.request_id {
            write!(f, " (request_id: {id})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteError {}

/// Errors from xpan API calls and the upload pipeline.
#[derive(Debug, thiserror::Error)]
pub enum XpanError {
    /// HTTP transport error (connection reset, timeout, TLS).
    #[error("HTTP error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The remote answered HTTP 429.
    #[error("{endpoint} rate limited (HTTP 429)")]
    RateLimited { endpoint: String },
    /// 5xx without a structured error body.
    #[error("{endpoint} returned server error {status}: {body}")]
    ServerError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Structured application-level rejection.
    #[error("{endpoint} rejected the request: {error}")]
    Remote {
        endpoint: String,
        #[source]
        error: RemoteError,
    },
    /// Non-2xx, non-5xx response without a structured error body.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response body did not match the expected schema.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: serde_json::Error,
    },
    /// Response parsed but contradicts the protocol.
    #[error("protocol violation from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },
    /// The remote acknowledged a block with a different hash than was sent.
    #[error("block {index} corrupted in transit: sent {expected}, remote saw {actual}")]
    BlockCorrupted {
        index: usize,
        expected: String,
        actual: String,
    },
    /// A required block could not be delivered; the upload was abandoned.
    #[error("block {index} upload failed: {source}")]
    BlockUpload {
        index: usize,
        source: Box<XpanError>,
    },
    /// Declared size disagrees with the content.
    #[error("size error: {0}")]
    Size(#[from] SizeError),
    /// The caller cancelled or the deadline passed.
    #[error("upload cancelled")]
    Cancelled,
    /// No usable access token.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The remote path cannot be resolved.
    #[error("invalid remote path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    /// Local I/O error while buffering content.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl XpanError {
    /// Whether the pacer may try the call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { source, .. } => !source.is_builder(),
            Self::RateLimited { .. } | Self::ServerError { .. } | Self::BlockCorrupted { .. } => true,
            Self::Remote { error, .. } => error.is_transient(),
            _ => false,
        }
    }

    /// The remote application error code, looking through block failures.
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::Remote { error, .. } => Some(error.code),
            Self::BlockUpload { source, .. } => source.remote_code(),
            _ => None,
        }
    }
}

impl From<CoreError> for XpanError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Size(e) => Self::Size(e),
            CoreError::Io(e) => Self::Io(e),
            CoreError::BlockOutOfRange { index, block_count } => Self::Protocol {
                endpoint: "superfile2".into(),
                reason: format!("block {index} out of range ({block_count} blocks)"),
            },
        }
    }
}
