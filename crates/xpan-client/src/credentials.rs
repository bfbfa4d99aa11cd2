//! Access-token source.
//!
//! Token acquisition and refresh happen out of band. The client asks the
//! provider for the current token on every attempt, so a refresh that lands
//! between retries is picked up without restarting the upload.

use zeroize::Zeroizing;

/// Errors from a [`TokenProvider`].
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("no access token available")]
    Missing,
    #[error("token refresh failed: {0}")]
    Refresh(String),
}

/// Supplies the current bearer token.
pub trait TokenProvider: Send + Sync + std::fmt::Debug {
    /// The token to attach to the next request. Called once per attempt.
    fn access_token(&self) -> Result<Zeroizing<String>, CredentialError>;
}

/// A fixed token, typically read from configuration.
#[derive(Clone)]
pub struct StaticToken(Zeroizing<String>);

impl StaticToken {
    /// Wrap `token`; the copy is zeroed on drop.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticToken").field(&"[REDACTED]").finish()
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Result<Zeroizing<String>, CredentialError> {
        if self.0.is_empty() {
            return Err(CredentialError::Missing);
        }
        Ok(self.0.clone())
    }
}
