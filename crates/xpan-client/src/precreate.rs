//! Negotiator: the `precreate` call.
//!
//! Declares the content to the remote by hash and learns which blocks, if
//! any, still have to be sent.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/rest/2.0/xpan/file?method=precreate` | Declare content, open a session |

use serde::Deserialize;
use url::Url;
use xpan_core::{ContentDigest, Md5Hex, UploadTarget};

use crate::cancel::CancelToken;
use crate::error::XpanError;
use crate::transport::{endpoint_url, Transport};

pub(crate) const FILE_API_PATH: &str = "rest/2.0/xpan/file";

const ENDPOINT: &str = "precreate";

/// `return_type` value meaning the remote already holds the content.
const RETURN_TYPE_RAPID: i64 = 2;

// -- Wire types ---------------------------------------------------------------

/// A block index as the remote sends it: a number, or a number in a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BlockIndex {
    /// `3`
    Num(u64),
    /// `"3"`
    Text(String),
}

impl BlockIndex {
    fn resolve(&self) -> Option<usize> {
        match self {
            Self::Num(n) => usize::try_from(*n).ok(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Raw precreate response.
#[derive(Debug, Clone, Deserialize)]
pub struct PrecreateResponse {
    /// Session id; absent on a rapid match.
    #[serde(default, rename = "uploadid")]
    pub upload_id: Option<String>,
    /// `2` when the remote already holds the content.
    #[serde(default)]
    pub return_type: i64,
    /// Indexes of the blocks the remote still needs.
    #[serde(default)]
    pub block_list: Vec<BlockIndex>,
    /// Absolute path the remote echoed back, if any.
    #[serde(default)]
    pub path: Option<String>,
}

// -- Outcomes -----------------------------------------------------------------

/// An open upload session. Owned by exactly one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Server-issued session identifier.
    pub upload_id: String,
    /// The full ordered block-hash list the session was negotiated with.
    pub block_md5s: Vec<Md5Hex>,
    /// Indices the remote still needs, ascending and without duplicates.
    pub needed: Vec<usize>,
}

/// What the remote decided about the declared content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// The content is already present; no block needs to be sent.
    Rapid {
        /// Session identifier, if the remote issued one anyway.
        upload_id: Option<String>,
    },
    /// The named blocks must be sent before finalizing.
    Upload(UploadSession),
}

impl PrecreateResponse {
    /// Validate the response against the digest it answers.
    pub fn into_negotiation(self, digest: &ContentDigest) -> Result<Negotiation, XpanError> {
        let upload_id = self.upload_id.filter(|id| !id.is_empty());
        if self.return_type == RETURN_TYPE_RAPID {
            return Ok(Negotiation::Rapid { upload_id });
        }

        let upload_id = upload_id.ok_or_else(|| XpanError::Protocol {
            endpoint: ENDPOINT.into(),
            reason: "response carries neither rapid return_type nor uploadid".into(),
        })?;

        let block_count = digest.block_count();
        let mut needed = Vec::with_capacity(self.block_list.len());
        for raw in &self.block_list {
            match raw.resolve() {
                Some(index) if index < block_count => needed.push(index),
                _ => {
                    return Err(XpanError::Protocol {
                        endpoint: ENDPOINT.into(),
                        reason: format!("block number out of range: {raw:?} of {block_count}"),
                    })
                }
            }
        }
        needed.sort_unstable();
        needed.dedup();

        Ok(Negotiation::Upload(UploadSession {
            upload_id,
            block_md5s: digest.block_md5s.clone(),
            needed,
        }))
    }
}

// -- Client -------------------------------------------------------------------

/// Client for the precreate call on the file API host.
#[derive(Debug, Clone)]
pub struct PrecreateClient {
    transport: Transport,
    base_url: Url,
}

impl PrecreateClient {
    pub(crate) fn new(transport: Transport, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    /// Declare `digest` for `remote_path` and interpret the answer.
    ///
    /// `remote_path` is the already-resolved absolute path. A structured
    /// rejection (quota, existing path under a fail policy) surfaces as
    /// [`XpanError::Remote`].
    pub async fn precreate(
        &self,
        remote_path: &str,
        target: &UploadTarget,
        digest: &ContentDigest,
        cancel: &CancelToken,
    ) -> Result<Negotiation, XpanError> {
        let url = endpoint_url(&self.base_url, FILE_API_PATH);
        let size = target.size().to_string();
        let rtype = target.conflict().rtype().to_string();
        let block_list = digest.block_list_json();

        self.transport
            .call(
                ENDPOINT,
                cancel,
                |http, token| {
                    http.post(&url)
                        .query(&[("method", "precreate"), ("access_token", token)])
                        .form(&[
                            ("path", remote_path),
                            ("size", size.as_str()),
                            ("isdir", "0"),
                            ("autoinit", "1"),
                            ("rtype", rtype.as_str()),
                            ("block_list", block_list.as_str()),
                            ("content-md5", digest.content_md5.as_str()),
                            ("slice-md5", digest.slice_md5.as_str()),
                        ])
                },
                |response: PrecreateResponse| response.into_negotiation(digest),
            )
            .await
    }
}
