//! Configuration options for the recipe API client

use std::env;
use std::time::Duration;

use crate::error::{ApiError, Result};

/// Configuration options for the recipe API client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the API, e.g. `https://recipes.example.com/api`
    pub base_url: String,

    /// Whether to refresh the access token once when a request is rejected with 401
    pub auto_refresh_token: bool,

    /// Whether tokens are written to the token storage
    pub persist_session: bool,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Append a trailing `/` to every request path
    pub trailing_slash: bool,

    /// Storage key for the access token
    pub access_token_key: String,

    /// Storage key for the refresh token
    pub refresh_token_key: String,

    /// How often the unread notification count is polled
    pub unread_poll_interval: Duration,

    /// Stale time for queries that do not set their own
    pub default_stale_time: Duration,

    /// Retries for failed reads that do not set their own
    pub default_retry: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            auto_refresh_token: true,
            persist_session: true,
            request_timeout: Some(Duration::from_secs(30)),
            trailing_slash: false,
            access_token_key: "access_token".to_string(),
            refresh_token_key: "refresh_token".to_string(),
            unread_poll_interval: Duration::from_secs(30),
            default_stale_time: Duration::ZERO,
            default_retry: 1,
        }
    }
}

impl ClientOptions {
    /// Options pointing at the given API base URL
    pub fn new(base_url: &str) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Read options from the environment.
    ///
    /// `RECIPE_API_URL` is required; `RECIPE_API_TIMEOUT_SECS`,
    /// `RECIPE_API_TRAILING_SLASH` and `RECIPE_UNREAD_POLL_SECS` are optional.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("RECIPE_API_URL")
            .map_err(|_| ApiError::Url("RECIPE_API_URL must be set".to_string()))?;
        let mut options = Self::new(&base_url);

        if let Some(secs) = env_u64("RECIPE_API_TIMEOUT_SECS") {
            options.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Ok(value) = env::var("RECIPE_API_TRAILING_SLASH") {
            options.trailing_slash = matches!(value.as_str(), "1" | "true" | "yes");
        }
        if let Some(secs) = env_u64("RECIPE_UNREAD_POLL_SECS") {
            options.unread_poll_interval = Duration::from_secs(secs);
        }

        Ok(options)
    }

    /// Set the API base URL
    pub fn with_base_url(mut self, value: &str) -> Self {
        self.base_url = value.trim_end_matches('/').to_string();
        self
    }

    /// Set whether to automatically refresh the token
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    /// Set whether to persist the session
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set whether request paths end with `/`
    pub fn with_trailing_slash(mut self, value: bool) -> Self {
        self.trailing_slash = value;
        self
    }

    /// Set the storage keys used for the token pair
    pub fn with_token_keys(mut self, access: &str, refresh: &str) -> Self {
        self.access_token_key = access.to_string();
        self.refresh_token_key = refresh.to_string();
        self
    }

    /// Set the unread notification polling interval
    pub fn with_unread_poll_interval(mut self, value: Duration) -> Self {
        self.unread_poll_interval = value;
        self
    }

    /// Set the fallback query stale time
    pub fn with_default_stale_time(mut self, value: Duration) -> Self {
        self.default_stale_time = value;
        self
    }

    /// Set the fallback retry count for reads
    pub fn with_default_retry(mut self, value: u32) -> Self {
        self.default_retry = value;
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
