//! # xpan-client -- Typed async client for chunked xpan uploads
//!
//! Drives the three-phase upload protocol against the remote file API:
//! - **precreate** declares the content by hash and learns which blocks are
//!   missing ([`precreate::PrecreateClient`])
//! - **superfile2** sends each missing block to the upload host
//!   ([`superfile::BlockClient`])
//! - **create** commits the session into a file ([`create::CreateClient`])
//!
//! [`XpanClient::upload`] runs the whole pipeline.
//!
//! ## Shared pacing
//!
//! Every call from every sub-client goes through one [`Pacer`]. Cloning an
//! `XpanClient` shares it, so concurrent uploads observe the same rate-limit
//! pressure. Tests inject a tight policy through [`XpanClient::with_parts`].
//!
//! ## Error envelopes
//!
//! The file API and the upload host report failures in different JSON
//! shapes, both possibly with HTTP 200. They are normalized into
//! [`RemoteError`] before any caller sees them.

pub mod cancel;
pub mod config;
pub mod create;
pub mod credentials;
pub(crate) mod envelope;
pub mod error;
pub mod pacer;
pub mod paths;
pub mod precreate;
pub mod superfile;
pub(crate) mod transport;
mod upload;

pub use cancel::{CancelSource, CancelToken};
pub use config::{ConfigError, XpanConfig};
pub use credentials::{CredentialError, StaticToken, TokenProvider};
pub use error::{RemoteError, XpanError};
pub use pacer::{Pacer, PacerConfig};
pub use paths::{PathResolver, RootedPaths};
pub use precreate::{Negotiation, UploadSession};

use std::sync::Arc;
use std::time::Duration;

use transport::Transport;

/// Top-level xpan client. Holds a sub-client per protocol phase.
#[derive(Debug, Clone)]
pub struct XpanClient {
    precreate: precreate::PrecreateClient,
    blocks: superfile::BlockClient,
    create: create::CreateClient,
    paths: Arc<dyn PathResolver>,
    pacer: Pacer,
    memory_limit: u64,
}

impl XpanClient {
    /// Create a client from configuration, using the configured token and root.
    pub fn new(config: XpanConfig) -> Result<Self, XpanError> {
        let tokens = Arc::new(StaticToken::new(config.access_token.as_str()));
        let paths = Arc::new(RootedPaths::new(&config.root));
        let pacer = Pacer::new(config.pacer);
        Self::with_parts(config, tokens, paths, pacer)
    }

    /// Create a client with explicit collaborators.
    ///
    /// `config.access_token` and `config.root` are ignored in favor of
    /// `tokens` and `paths`.
    pub fn with_parts(
        config: XpanConfig,
        tokens: Arc<dyn TokenProvider>,
        paths: Arc<dyn PathResolver>,
        pacer: Pacer,
    ) -> Result<Self, XpanError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| XpanError::Transport {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let transport = Transport::new(http, pacer.clone(), tokens);
        Ok(Self {
            precreate: precreate::PrecreateClient::new(transport.clone(), config.api_url.clone()),
            blocks: superfile::BlockClient::new(transport.clone(), config.upload_url),
            create: create::CreateClient::new(transport, config.api_url),
            paths,
            pacer,
            memory_limit: config.memory_limit,
        })
    }

    /// Access the precreate (negotiation) client.
    pub fn precreate(&self) -> &precreate::PrecreateClient {
        &self.precreate
    }

    /// Access the block upload client.
    pub fn blocks(&self) -> &superfile::BlockClient {
        &self.blocks
    }

    /// Access the create (finalize) client.
    pub fn create(&self) -> &create::CreateClient {
        &self.create
    }

    /// The pacer shared by every call this client makes.
    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// The path resolver applied to upload targets.
    pub fn paths(&self) -> &dyn PathResolver {
        self.paths.as_ref()
    }
}
