//! The single path every remote call takes.
//!
//! [`Transport`] couples the shared HTTP client, the shared [`Pacer`] and the
//! token source. An endpoint supplies a request builder and a response
//! check; the transport handles tokens, cancellation, envelope
//! normalization and retries.

use std::sync::Arc;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use url::Url;

use crate::cancel::CancelToken;
use crate::credentials::TokenProvider;
use crate::envelope::interpret;
use crate::error::XpanError;
use crate::pacer::Pacer;

#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    pacer: Pacer,
    tokens: Arc<dyn TokenProvider>,
}

impl Transport {
    pub(crate) fn new(http: reqwest::Client, pacer: Pacer, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { http, pacer, tokens }
    }

    /// Issue a paced, retried call.
    ///
    /// `build` receives the HTTP client and the current access token and is
    /// invoked once per attempt. `check` validates the decoded body; an error
    /// it returns is classified like any other, so a retryable one (such as
    /// [`XpanError::BlockCorrupted`]) triggers another attempt.
    pub(crate) async fn call<T, U, B, C>(
        &self,
        endpoint: &str,
        cancel: &CancelToken,
        build: B,
        check: C,
    ) -> Result<U, XpanError>
    where
        T: DeserializeOwned,
        B: Fn(&reqwest::Client, &str) -> RequestBuilder,
        C: Fn(T) -> Result<U, XpanError>,
    {
        let build = &build;
        let check = &check;
        self.pacer
            .call(cancel, endpoint, || async move {
                let token = self.tokens.access_token()?;
                let request = build(&self.http, token.as_str());

                let response = cancel
                    .race(request.send())
                    .await?
                    .map_err(|e| transport_error(endpoint, e))?;
                let status = response.status();
                let body = cancel
                    .race(response.bytes())
                    .await?
                    .map_err(|e| transport_error(endpoint, e))?;

                tracing::trace!(endpoint, status = status.as_u16(), bytes = body.len(), "response");
                check(interpret::<T>(endpoint, status, &body)?)
            })
            .await
    }
}

/// The request URL carries the access token, so it is stripped from the error.
fn transport_error(endpoint: &str, source: reqwest::Error) -> XpanError {
    XpanError::Transport {
        endpoint: endpoint.into(),
        source: source.without_url(),
    }
}

/// Append `path` to `base`, tolerating a base with or without a trailing slash.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
