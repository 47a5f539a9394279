//! Download configuration.
//!
//! Everything the pipeline needs from its environment is collected here once,
//! then handed to the resolvers and the downloader by value.
//!
//! # Configuration Sources (in priority order, highest to lowest)
//!
//! 1. Explicit `with_*` builder calls
//! 2. Environment variables (`LOKI_API_URL`), read by [`Config::from_env`]
//! 3. Built-in defaults

use crate::http::HttpClientConfig;
use crate::platform::Platform;
use crate::retry::RetryPolicy;

/// Environment variable overriding the registry base URL.
pub const ENV_API_URL: &str = "LOKI_API_URL";
pub const DEFAULT_API_BASE_URL: &str = "https://api.lokipixis.ai";
pub const DEFAULT_GITHUB_BASE_URL: &str = "https://github.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// Hub registry API base URL
    pub api_base_url: String,
    /// Host serving public release archives
    pub github_base_url: String,
    /// Platform whose binaries are downloaded
    pub platform: Platform,
    pub retry: RetryPolicy,
    /// Draw progress bars while downloading
    pub show_progress: bool,
    pub http: HttpClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            github_base_url: DEFAULT_GITHUB_BASE_URL.to_string(),
            platform: Platform::current(),
            retry: RetryPolicy::default(),
            show_progress: true,
            http: HttpClientConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the registry URL taken from `LOKI_API_URL` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            config.api_base_url = url;
        }
        config
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_github_base_url(mut self, url: impl Into<String>) -> Self {
        self.github_base_url = url.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_http(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }
}
