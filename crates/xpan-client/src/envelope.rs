//! Response interpretation shared by every endpoint.
//!
//! The remote reports failures in two envelope shapes: `errno`/`errmsg` on
//! the file API and `error_code`/`error_msg` on the upload host. Either may
//! arrive with HTTP 200. Both normalize to [`RemoteError`] here, so callers
//! never inspect raw envelopes.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{RemoteError, XpanError};

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    errno: Option<i64>,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_msg: Option<String>,
    #[serde(default)]
    request_id: Option<serde_json::Value>,
}

impl Envelope {
    fn into_remote_error(self) -> Option<RemoteError> {
        let (code, message) = match (self.errno, self.error_code) {
            (Some(code), _) if code != 0 => (code, self.errmsg),
            (_, Some(code)) if code != 0 => (code, self.error_msg),
            _ => return None,
        };
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("remote error {code}"));
        let request_id = self.request_id.and_then(|id| match id {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Some(RemoteError {
            code,
            message,
            request_id,
        })
    }
}

/// Classify a response and decode its body into `T`.
///
/// Order matters: 429 wins over any body, a structured error wins over the
/// HTTP status, and only a clean 2xx body is decoded.
pub(crate) fn interpret<T: DeserializeOwned>(
    endpoint: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<T, XpanError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(XpanError::RateLimited {
            endpoint: endpoint.into(),
        });
    }

    let envelope: Envelope = serde_json::from_slice(body).unwrap_or_default();
    if let Some(error) = envelope.into_remote_error() {
        return Err(XpanError::Remote {
            endpoint: endpoint.into(),
            error,
        });
    }

    if status.is_server_error() {
        return Err(XpanError::ServerError {
            endpoint: endpoint.into(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }
    if !status.is_success() {
        return Err(XpanError::Api {
            endpoint: endpoint.into(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    serde_json::from_slice(body).map_err(|e| XpanError::Deserialization {
        endpoint: endpoint.into(),
        source: e,
    })
}
