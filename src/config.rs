//! Configuration types for talking to the PDF service.
//!
//! Every client knob lives in [`ClientConfig`], built through
//! [`ClientConfigBuilder`]. Polling behaviour is grouped separately in
//! [`PollPolicy`] because the poller is usable on its own.

use crate::error::WorkbenchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upload size limit enforced locally before any request: 20 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Default API base when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/api";

/// Configuration for an [`crate::transport::ApiClient`] and the orchestrator
/// built on top of it.
///
/// # Example
/// ```rust
/// use pdf_workbench::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:5000/api")
///     .poll_interval_ms(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "http://localhost:5000/api");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL, without a trailing slash. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Timeout for ordinary JSON requests in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Timeout for uploads and binary downloads in seconds. Default: 300.
    pub transfer_timeout_secs: u64,

    /// Largest file accepted for upload, inclusive. Default: 20 MiB.
    pub max_upload_bytes: u64,

    /// How task status is polled.
    pub poll: PollPolicy,

    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 60,
            transfer_timeout_secs: 300,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            poll: PollPolicy::default(),
            user_agent: concat!("pdf-workbench/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn transfer_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transfer_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn poll(mut self, policy: PollPolicy) -> Self {
        self.config.poll = policy;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll.interval_ms = ms;
        self
    }

    pub fn poll_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.poll.max_duration_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, WorkbenchError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(WorkbenchError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.request_timeout_secs == 0 || c.transfer_timeout_secs == 0 {
            return Err(WorkbenchError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(WorkbenchError::InvalidConfig(
                "upload limit must be ≥ 1 byte".into(),
            ));
        }
        c.poll.validate()?;
        Ok(self.config)
    }
}

/// Timing policy for [`crate::poller::poll_task`].
///
/// The wait before each status query starts at `interval_ms` and is
/// multiplied by `backoff_factor` after every tick that reports no new
/// progress, up to `max_interval_ms`. Any progress advance drops the wait
/// back to `interval_ms`. `backoff_factor = 1.0` with
/// `max_duration_secs = None` polls at a fixed rate forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Base wait between status queries. Default: 300 ms.
    pub interval_ms: u64,

    /// Ceiling for the backed-off wait. Default: 3000 ms.
    pub max_interval_ms: u64,

    /// Growth factor applied while progress is flat. Default: 1.5.
    pub backoff_factor: f64,

    /// Overall deadline for one task. Default: 30 minutes. `None` = unbounded.
    pub max_duration_secs: Option<u64>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 300,
            max_interval_ms: 3_000,
            backoff_factor: 1.5,
            max_duration_secs: Some(30 * 60),
        }
    }
}

impl PollPolicy {
    /// Constant interval, no backoff, no deadline.
    pub fn fixed(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            max_interval_ms: interval_ms,
            backoff_factor: 1.0,
            max_duration_secs: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }

    /// The wait that follows `current` after a tick without progress.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let ceiling = Duration::from_millis(self.max_interval_ms.max(self.interval_ms));
        current.mul_f64(self.backoff_factor).min(ceiling)
    }

    fn validate(&self) -> Result<(), WorkbenchError> {
        if self.interval_ms == 0 {
            return Err(WorkbenchError::InvalidConfig(
                "poll interval must be ≥ 1 ms".into(),
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(WorkbenchError::InvalidConfig(format!(
                "poll backoff factor must be ≥ 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.max_duration_secs == Some(0) {
            return Err(WorkbenchError::InvalidConfig(
                "poll timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(())
    }
}
