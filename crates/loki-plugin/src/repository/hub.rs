//! Hub registry client.
//!
//! The registry answers asset lookups with a signed download location and the
//! archive's SHA-256. Status codes are handed back untouched so the installer
//! can decide what each one means for the user.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::http::HttpClient;
use crate::platform::Platform;
use crate::plugin::PluginIdentity;
use crate::{PluginError, Result};

/// Where to fetch a plugin archive from, and what it should hash to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginAsset {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Registry lookup parameters.
#[derive(Debug, Clone)]
pub struct AssetRequest<'a> {
    pub plugin: &'a PluginIdentity,
    /// Team the caller acts for; selects the team-scoped endpoint
    pub team_name: Option<&'a str>,
    pub auth_token: Option<&'a str>,
}

pub struct HubResolver {
    http_client: HttpClient,
    base_url: String,
    platform: Platform,
}

impl HubResolver {
    pub fn new(http_client: HttpClient, base_url: impl Into<String>, platform: Platform) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            platform,
        }
    }

    /// Endpoint for the asset lookup.
    pub fn asset_url(&self, request: &AssetRequest<'_>) -> String {
        let base_url = self.base_url.trim_end_matches('/');
        let plugin = request.plugin;
        let path = format!(
            "plugins/{}/{}/{}/versions/{}/assets/{}",
            plugin.org,
            plugin.kind,
            plugin.name,
            plugin.version,
            self.platform.target()
        );
        match request.team_name.filter(|t| !t.is_empty()) {
            Some(team) => format!("{}/teams/{}/{}", base_url, team, path),
            None => format!("{}/{}", base_url, path),
        }
    }

    /// Look up the asset. The body is only parsed for a 200 response.
    pub async fn resolve(
        &self,
        request: &AssetRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(Option<PluginAsset>, u16)> {
        let url = self.asset_url(request);
        let mut builder = self
            .http_client
            .request(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = request.auth_token.filter(|t| !t.is_empty()) {
            builder = builder.bearer_auth(token);
        }

        let response = self.http_client.send(builder, &url, cancel).await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Ok((None, status));
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PluginError::Cancelled),
            body = response.text() => body.map_err(|e| PluginError::transport(&url, e))?,
        };
        if body.trim().is_empty() {
            return Ok((None, status));
        }
        let asset = serde_json::from_str(&body)?;
        Ok((Some(asset), status))
    }
}
