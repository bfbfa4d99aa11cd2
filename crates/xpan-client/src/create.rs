//! Finalizer: the `create` call.
//!
//! Commits a session (or, on the rapid path, the declared block list alone)
//! into a durable file. This is the only call that makes an upload visible.
//! It is retried only for transient failures; a structured rejection is
//! surfaced as is, since a commit may have partially taken effect.

use serde::Deserialize;
use url::Url;
use xpan_core::{CommittedFile, ContentDigest, UploadTarget};

use crate::cancel::CancelToken;
use crate::error::XpanError;
use crate::precreate::FILE_API_PATH;
use crate::transport::{endpoint_url, Transport};

const ENDPOINT: &str = "create";

/// Raw create response.
///
/// The timestamp fields arrive as `ctime`/`mtime` or
/// `server_ctime`/`server_mtime` depending on the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateResponse {
    #[serde(default)]
    pub fs_id: u64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub server_filename: Option<String>,
    #[serde(default)]
    pub category: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub ctime: i64,
    #[serde(default)]
    pub mtime: i64,
    #[serde(default)]
    pub server_ctime: i64,
    #[serde(default)]
    pub server_mtime: i64,
    #[serde(default)]
    pub isdir: u8,
}

impl CreateResponse {
    /// Convert into the public descriptor.
    pub fn into_committed(self) -> Result<CommittedFile, XpanError> {
        if self.fs_id == 0 {
            return Err(XpanError::Protocol {
                endpoint: ENDPOINT.into(),
                reason: "response carries no fs_id".into(),
            });
        }
        if self.isdir != 0 {
            return Err(XpanError::Protocol {
                endpoint: ENDPOINT.into(),
                reason: format!("{} was committed as a directory", self.path),
            });
        }

        let server_filename = self
            .server_filename
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.path.rsplit('/').next().unwrap_or_default().to_string());
        let first_set = |a: i64, b: i64| if a > 0 { a } else { b };

        Ok(CommittedFile {
            fs_id: self.fs_id,
            server_filename,
            size: self.size,
            md5: self.md5,
            category: self.category,
            created_at: CommittedFile::timestamp(first_set(self.ctime, self.server_ctime)),
            modified_at: CommittedFile::timestamp(first_set(self.mtime, self.server_mtime)),
            path: self.path,
        })
    }
}

/// Client for the create call on the file API host.
#[derive(Debug, Clone)]
pub struct CreateClient {
    transport: Transport,
    base_url: Url,
}

impl CreateClient {
    pub(crate) fn new(transport: Transport, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    /// Commit the file at `remote_path`.
    ///
    /// `upload_id` may be empty only when precreate reported rapid success.
    pub async fn create(
        &self,
        remote_path: &str,
        target: &UploadTarget,
        upload_id: &str,
        digest: &ContentDigest,
        cancel: &CancelToken,
    ) -> Result<CommittedFile, XpanError> {
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
                        .query(&[("method", "create"), ("access_token", token)])
                        .form(&[
                            ("path", remote_path),
                            ("size", size.as_str()),
                            ("isdir", "0"),
                            ("rtype", rtype.as_str()),
                            ("uploadid", upload_id),
                            ("block_list", block_list.as_str()),
                        ])
                },
                CreateResponse::into_committed,
            )
            .await
    }
}
