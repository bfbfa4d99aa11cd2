//! xpan client configuration.
//!
//! Configures the two remote hosts (file API and upload host), the remote
//! root, the access token, pacing, and buffering. Defaults point to the
//! production endpoints. Override via environment variables or explicit
//! construction for staging/testing.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

use crate::pacer::PacerConfig;

/// Default in-memory buffering limit: 16 MiB (four blocks).
pub const DEFAULT_MEMORY_LIMIT: u64 = 16 * 1024 * 1024;

/// The upload host rejects block uploads from other user agents.
pub const DEFAULT_USER_AGENT: &str = "pan.baidu.com";

/// Configuration for connecting to the xpan services.
///
/// Custom `Debug` implementation redacts the `access_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct XpanConfig {
    /// Base URL for the file API (precreate, create).
    /// Default: <https://pan.baidu.com>
    pub api_url: Url,
    /// Base URL for the block upload host (superfile2).
    /// Default: <https://d.pcs.baidu.com>
    pub upload_url: Url,
    /// Remote directory every upload path is resolved under.
    pub root: String,
    /// Bearer token sent as the `access_token` query parameter.
    pub access_token: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header for every request.
    pub user_agent: String,
    /// Shared pacing policy.
    pub pacer: PacerConfig,
    /// Content larger than this spills to a temporary file.
    pub memory_limit: u64,
}

impl std::fmt::Debug for XpanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XpanConfig")
            .field("api_url", &self.api_url)
            .field("upload_url", &self.upload_url)
            .field("root", &self.root)
            .field("access_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("pacer", &self.pacer)
            .field("memory_limit", &self.memory_limit)
            .finish()
    }
}

impl XpanConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `XPAN_ACCESS_TOKEN` (required)
    /// - `XPAN_API_URL` (default: `https://pan.baidu.com`)
    /// - `XPAN_UPLOAD_URL` (default: `https://d.pcs.baidu.com`)
    /// - `XPAN_ROOT` (default: empty, i.e. `/`)
    /// - `XPAN_TIMEOUT_SECS` (default: 300)
    /// - `XPAN_MIN_SLEEP_MS` (default: 10)
    /// - `XPAN_MAX_SLEEP_MS` (default: 2000)
    /// - `XPAN_DECAY_CONSTANT` (default: 2)
    /// - `XPAN_LOW_LEVEL_RETRIES` (default: 10)
    /// - `XPAN_MEMORY_LIMIT_BYTES` (default: 16 MiB)
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token = std::env::var("XPAN_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let defaults = PacerConfig::default();
        let pacer = PacerConfig {
            min_sleep: Duration::from_millis(env_num(
                "XPAN_MIN_SLEEP_MS",
                defaults.min_sleep.as_millis() as u64,
            )?),
            max_sleep: Duration::from_millis(env_num(
                "XPAN_MAX_SLEEP_MS",
                defaults.max_sleep.as_millis() as u64,
            )?),
            decay_constant: env_num("XPAN_DECAY_CONSTANT", defaults.decay_constant)?,
            low_level_retries: env_num("XPAN_LOW_LEVEL_RETRIES", defaults.low_level_retries)?,
        };

        Ok(Self {
            api_url: env_url("XPAN_API_URL", "https://pan.baidu.com")?,
            upload_url: env_url("XPAN_UPLOAD_URL", "https://d.pcs.baidu.com")?,
            root: std::env::var("XPAN_ROOT").unwrap_or_default(),
            access_token: Zeroizing::new(access_token),
            timeout_secs: env_num("XPAN_TIMEOUT_SECS", 300)?,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pacer,
            memory_limit: env_num("XPAN_MEMORY_LIMIT_BYTES", DEFAULT_MEMORY_LIMIT)?,
        })
    }

    /// Create a configuration pointing both hosts at one mock server (for testing).
    ///
    /// Pacing is tightened so retry tests finish quickly.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `uri` cannot be parsed.
    pub fn local_mock(uri: &str, token: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(uri).map_err(|e| ConfigError::InvalidUrl(uri.to_string(), e.to_string()))?;
        Ok(Self {
            api_url: url.clone(),
            upload_url: url,
            root: String::new(),
            access_token: Zeroizing::new(token.to_string()),
            timeout_secs: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pacer: PacerConfig {
                min_sleep: Duration::from_millis(1),
                max_sleep: Duration::from_millis(20),
                decay_constant: 2,
                low_level_retries: 4,
            },
            memory_limit: DEFAULT_MEMORY_LIMIT,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_num<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("XPAN_ACCESS_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
}
