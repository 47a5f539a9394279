//! HTTP client shared by the resolvers and the downloader.
//!
//! This module wraps `reqwest` with the plugin downloader's needs:
//! - Custom User-Agent header
//! - Connect timeout, optional overall timeout and proxy support
//! - Requests that race against a [`CancellationToken`]
//! - Redaction of URLs before they are shown to the user
//!
//! Retries are not handled here; see [`crate::retry::RetryPolicy`].

use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{PluginError, Result};

const DEFAULT_USER_AGENT: &str = concat!("loki-plugin/", env!("CARGO_PKG_VERSION"));
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        // Plugin archives can be large, so there is no overall timeout unless asked for
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| PluginError::transport(proxy_url, e))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| PluginError::transport("client", e))?;

        Ok(Self {
            client,
            user_agent: config.user_agent,
        })
    }

    /// Metadata-only request.
    pub async fn head(&self, url: &str, cancel: &CancellationToken) -> Result<Response> {
        self.send(self.client.head(url), url, cancel).await
    }

    pub async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<Response> {
        self.send(self.client.get(url), url, cancel).await
    }

    /// Start a GET request that the caller decorates with headers.
    pub fn request(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a prepared request, giving up as soon as `cancel` fires.
    pub async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PluginError::Cancelled),
            response = request.send() => response.map_err(|e| PluginError::transport(url, e)),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Strip query string, fragment and credentials so signed URLs are safe to print.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}
