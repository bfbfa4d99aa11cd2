//! The upload pipeline: digest, negotiate, transmit, finalize.

use std::io::Read;

use tracing::Instrument;
use xpan_core::{CommittedFile, DigestEngine, UploadTarget, BLOCK_SIZE};

use crate::cancel::CancelToken;
use crate::error::XpanError;
use crate::precreate::Negotiation;
use crate::XpanClient;

impl XpanClient {
    /// Upload `content` to `target` and return the committed file.
    ///
    /// `content` must yield exactly `target.size()` bytes. It is read once,
    /// on a blocking thread, while the digests are computed. The steps run
    /// strictly in order; the first error ends the upload and is returned
    /// unchanged. No file becomes visible unless the final commit succeeds.
    pub async fn upload<R>(
        &self,
        target: UploadTarget,
        content: R,
        cancel: &CancelToken,
    ) -> Result<CommittedFile, XpanError>
    where
        R: Read + Send + 'static,
    {
        let span = tracing::info_span!("upload", path = target.path(), size = target.size());
        self.run_upload(target, content, cancel).instrument(span).await
    }

    async fn run_upload<R>(
        &self,
        target: UploadTarget,
        content: R,
        cancel: &CancelToken,
    ) -> Result<CommittedFile, XpanError>
    where
        R: Read + Send + 'static,
    {
        if target.block_size() != BLOCK_SIZE {
            return Err(XpanError::Protocol {
                endpoint: "precreate".into(),
                reason: format!(
                    "block size {} rejected; the remote requires {BLOCK_SIZE}",
                    target.block_size()
                ),
            });
        }
        let remote_path = self.paths.resolve(target.path())?;

        let engine = DigestEngine::new(self.memory_limit);
        let digest_target = target.clone();
        let digesting =
            tokio::task::spawn_blocking(move || engine.digest(&digest_target, content));
        let (digest, buffer) = cancel
            .race(digesting)
            .await?
            .map_err(|e| XpanError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        let upload_id = match self
            .precreate
            .precreate(&remote_path, &target, &digest, cancel)
            .await?
        {
            Negotiation::Rapid { upload_id } => {
                tracing::info!(path = %remote_path, "rapid upload: content already present");
                upload_id.unwrap_or_default()
            }
            Negotiation::Upload(session) => {
                tracing::info!(
                    path = %remote_path,
                    upload_id = %session.upload_id,
                    needed = session.needed.len(),
                    blocks = digest.block_count(),
                    "upload session opened"
                );
                self.blocks
                    .transmit(&remote_path, &target, &buffer, &session, cancel)
                    .await?;
                session.upload_id
            }
        };
        drop(buffer);

        let file = self
            .create
            .create(&remote_path, &target, &upload_id, &digest, cancel)
            .await?;

        if file.size != target.size() {
            tracing::warn!(
                declared = target.size(),
                committed = file.size,
                "committed size differs from declared size"
            );
        }
        tracing::info!(fs_id = file.fs_id, path = %file.path, "upload committed");
        Ok(file)
    }
}
