//! GitHub release resolver.
//!
//! Plugins have been published under several release layouts over time. Each
//! layout is a row in [`CONVENTIONS`]; resolving a plugin builds the candidate
//! URLs from the rows that apply to it and probes them in table order.

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::http::HttpClient;
use crate::platform::Platform;
use crate::plugin::{PluginIdentity, PluginKind};
use crate::{PluginError, Result};

/// Owner of the monorepo that used to host first-party plugins.
pub const MONOREPO_OWNER: &str = "pixis";
pub const MONOREPO_NAME: &str = "loki";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `<owner>/loki`, one release tag per plugin version
    Monorepo,
    /// `<org>/loki-<prefix>-<name>`, one repository per plugin
    PerRepository,
}

/// One historical release layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convention {
    pub layout: Layout,
    /// `source`, `destination`, or the retired `plugin`
    pub prefix: &'static str,
    /// Kind whose lookups probe this layout; `None` for layouts that are only
    /// recognized when extracting
    pub probe_for: Option<PluginKind>,
}

pub const CONVENTIONS: &[Convention] = &[
    Convention {
        layout: Layout::PerRepository,
        prefix: "source",
        probe_for: Some(PluginKind::Source),
    },
    Convention {
        layout: Layout::PerRepository,
        prefix: "destination",
        probe_for: Some(PluginKind::Destination),
    },
    Convention {
        layout: Layout::Monorepo,
        prefix: "source",
        probe_for: Some(PluginKind::Source),
    },
    Convention {
        layout: Layout::Monorepo,
        prefix: "destination",
        probe_for: Some(PluginKind::Destination),
    },
    Convention {
        layout: Layout::PerRepository,
        prefix: "plugin",
        probe_for: None,
    },
    Convention {
        layout: Layout::Monorepo,
        prefix: "plugin",
        probe_for: None,
    },
];

impl Convention {
    fn applies_to(&self, plugin: &PluginIdentity) -> bool {
        self.probe_for == Some(plugin.kind)
            && (self.layout == Layout::PerRepository || plugin.org == MONOREPO_OWNER)
    }

    /// Leading part shared by every release URL of this layout.
    pub fn url_prefix(&self, base_url: &str, org: &str) -> String {
        let base_url = base_url.trim_end_matches('/');
        match self.layout {
            Layout::Monorepo => format!(
                "{}/{}/{}/releases/download/plugins-{}",
                base_url, MONOREPO_OWNER, MONOREPO_NAME, self.prefix
            ),
            Layout::PerRepository => format!("{}/{}/loki-{}", base_url, org, self.prefix),
        }
    }

    /// Release archive URL for `plugin` on `platform`.
    pub fn archive_url(&self, base_url: &str, plugin: &PluginIdentity, platform: &Platform) -> String {
        let prefix = self.url_prefix(base_url, &plugin.org);
        match self.layout {
            Layout::Monorepo => format!(
                "{}-{}-{}/{}_{}.zip",
                prefix,
                plugin.name,
                plugin.version,
                plugin.name,
                platform.target()
            ),
            Layout::PerRepository => format!(
                "{}-{}/releases/download/{}/loki-{}-{}_{}.zip",
                prefix,
                plugin.name,
                plugin.version,
                self.prefix,
                plugin.name,
                platform.target()
            ),
        }
    }

    /// Name of the plugin binary inside archives of this layout.
    pub fn entry_name(&self, name: &str, platform: &Platform) -> String {
        let entry = match self.layout {
            Layout::Monorepo => format!("plugins/{}/{}", self.prefix, name),
            Layout::PerRepository => format!("loki-{}-{}", self.prefix, name),
        };
        platform.with_binary_suffix(&entry)
    }

    /// Layout a resolved release URL was built from.
    pub fn for_url(base_url: &str, org: &str, url: &str) -> Option<&'static Convention> {
        CONVENTIONS
            .iter()
            .find(|c| url.starts_with(&c.url_prefix(base_url, org)))
    }
}

/// Finds which release layout hosts a plugin version.
pub struct GitHubResolver {
    http_client: HttpClient,
    base_url: String,
    platform: Platform,
}

impl GitHubResolver {
    pub fn new(http_client: HttpClient, base_url: impl Into<String>, platform: Platform) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            platform,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Candidate archive URLs, in probing order.
    pub fn candidate_urls(&self, plugin: &PluginIdentity) -> Vec<String> {
        CONVENTIONS
            .iter()
            .filter(|c| c.applies_to(plugin))
            .map(|c| c.archive_url(&self.base_url, plugin, &self.platform))
            .collect()
    }

    /// URL of the first candidate that exists.
    pub async fn resolve(&self, plugin: &PluginIdentity, cancel: &CancellationToken) -> Result<String> {
        let candidates = self.candidate_urls(plugin);
        self.probe(&candidates, plugin, cancel).await
    }

    /// Probe `candidates` in order.
    ///
    /// A 404 moves on to the next candidate. Any other failure stops the
    /// search, so an outage is never reported as a missing plugin.
    pub async fn probe(
        &self,
        candidates: &[String],
        plugin: &PluginIdentity,
        cancel: &CancellationToken,
    ) -> Result<String> {
        for url in candidates {
            log::debug!("Probing {}", url);
            let response = self.http_client.head(url, cancel).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(url.clone());
            }
            if status == StatusCode::NOT_FOUND {
                continue;
            }

            log::warn!("Failed probing {} with status code {}", url, status.as_u16());
            return Err(PluginError::HttpStatus {
                status: status.as_u16(),
                url: url.clone(),
            });
        }

        Err(PluginError::NotFound {
            org: plugin.org.clone(),
            name: plugin.name.clone(),
            version: plugin.version.clone(),
        })
    }
}
