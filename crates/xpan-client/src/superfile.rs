//! Block Transmitter: the `superfile2` call on the upload host.
//!
//! Each needed block is sent as its own multipart request, in ascending
//! index order. The first block that exhausts its retries aborts the whole
//! transfer; later blocks are not attempted.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use url::Url;
use xpan_core::{ContentBuffer, Md5Hex, UploadTarget};

use crate::cancel::CancelToken;
use crate::error::XpanError;
use crate::precreate::UploadSession;
use crate::transport::{endpoint_url, Transport};

const UPLOAD_PATH: &str = "rest/2.0/pcs/superfile2";

const ENDPOINT: &str = "superfile2";

/// Raw block-upload acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockAck {
    /// Hash of the bytes the remote received, when reported.
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub request_id: Option<serde_json::Value>,
}

impl BlockAck {
    /// Compare the echoed hash with the one computed locally.
    fn verify(self, index: usize, expected: &Md5Hex) -> Result<(), XpanError> {
        let Some(reported) = self.md5.filter(|m| !m.is_empty()) else {
            return Ok(());
        };
        match Md5Hex::parse(&reported) {
            Some(actual) if &actual == expected => Ok(()),
            _ => Err(XpanError::BlockCorrupted {
                index,
                expected: expected.to_string(),
                actual: reported,
            }),
        }
    }
}

/// Client for block uploads.
#[derive(Debug, Clone)]
pub struct BlockClient {
    transport: Transport,
    base_url: Url,
}

impl BlockClient {
    pub(crate) fn new(transport: Transport, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    /// Upload one block under `upload_id`.
    ///
    /// Re-sending a block the remote already accepted is harmless, so the
    /// call is retried freely under the shared pacing policy.
    pub async fn upload_block(
        &self,
        remote_path: &str,
        upload_id: &str,
        index: usize,
        bytes: &[u8],
        expected: &Md5Hex,
        cancel: &CancelToken,
    ) -> Result<(), XpanError> {
        let url = endpoint_url(&self.base_url, UPLOAD_PATH);
        let partseq = index.to_string();
        let file_name = format!("chunk-{index}");

        self.transport
            .call(
                ENDPOINT,
                cancel,
                |http, token| {
                    let part = Part::bytes(bytes.to_vec()).file_name(file_name.clone());
                    http.post(&url)
                        .query(&[
                            ("method", "upload"),
                            ("access_token", token),
                            ("type", "tmpfile"),
                            ("path", remote_path),
                            ("uploadid", upload_id),
                            ("partseq", partseq.as_str()),
                        ])
                        .multipart(Form::new().part("file", part))
                },
                |ack: BlockAck| ack.verify(index, expected),
            )
            .await
    }

    /// Send every block the session names, returning the indices sent.
    ///
    /// Failures are wrapped in [`XpanError::BlockUpload`] carrying the
    /// failing index, except cancellation which propagates as is.
    pub async fn transmit(
        &self,
        remote_path: &str,
        target: &UploadTarget,
        content: &ContentBuffer,
        session: &UploadSession,
        cancel: &CancelToken,
    ) -> Result<Vec<usize>, XpanError> {
        let total = session.needed.len();
        let mut sent = Vec::with_capacity(total);

        for (position, &index) in session.needed.iter().enumerate() {
            let expected = session.block_md5s.get(index).ok_or_else(|| XpanError::Protocol {
                endpoint: ENDPOINT.into(),
                reason: format!(
                    "block number out of range: {index} of {}",
                    session.block_md5s.len()
                ),
            })?;
            let bytes = content.block(target, index)?;

            match self
                .upload_block(remote_path, &session.upload_id, index, &bytes, expected, cancel)
                .await
            {
                Ok(()) => {}
                Err(XpanError::Cancelled) => return Err(XpanError::Cancelled),
                Err(source) => {
                    return Err(XpanError::BlockUpload {
                        index,
                        source: Box::new(source),
                    })
                }
            }

            tracing::debug!(
                block = index,
                bytes = bytes.len(),
                sent = position + 1,
                total,
                "block acknowledged"
            );
            sent.push(index);
        }
        Ok(sent)
    }
}
