//! Plugin installation.
//!
//! [`PluginInstaller`] ties the pipeline together for both origins:
//! resolve the archive location, download it next to the destination,
//! verify it, and extract the platform binary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::downloader::{
    verify_checksum, ArchiveExtractor, ChecksumStatus, EntrySelector, FileDownloader,
};
use crate::http::HttpClient;
use crate::platform::Platform;
use crate::plugin::PluginIdentity;
use crate::progress::ProgressReporter;
use crate::repository::{AssetRequest, GitHubResolver, HubResolver};
use crate::{PluginError, Result};

/// Extension of the archive downloaded next to the binary.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Final binary path and the archive it is extracted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    path: PathBuf,
    archive_path: PathBuf,
}

impl DownloadTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut archive: OsString = path.clone().into_os_string();
        archive.push(".");
        archive.push(ARCHIVE_EXTENSION);
        Self {
            path,
            archive_path: PathBuf::from(archive),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Returns `false` when the binary is already installed, otherwise
    /// creates its parent directory.
    async fn prepare(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                PluginError::io(
                    format!("failed to create plugin directory {}", dir.display()),
                    e,
                )
            })?;
        }
        Ok(true)
    }
}

/// Options for a registry download.
#[derive(Debug, Clone)]
pub struct HubDownloadOptions {
    pub auth_token: Option<String>,
    /// Team the user is acting for
    pub team_name: Option<String>,
    pub local_path: PathBuf,
    pub plugin: PluginIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The binary was already at the destination; nothing was fetched
    AlreadyPresent,
    Installed {
        path: PathBuf,
        checksum: ChecksumStatus,
    },
}

/// What a registry status code means for the download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubStatus {
    Proceed,
    Unauthorized,
    VersionNotFound,
    RateLimited,
}

/// Registry status codes with a dedicated meaning. Anything else is unexpected.
pub const HUB_STATUS_POLICY: &[(u16, HubStatus)] = &[
    (200, HubStatus::Proceed),
    (401, HubStatus::Unauthorized),
    (404, HubStatus::VersionNotFound),
    (429, HubStatus::RateLimited),
];

pub fn classify_hub_status(status: u16) -> Option<HubStatus> {
    HUB_STATUS_POLICY
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, class)| *class)
}

/// Attach the plugin and the failed step to an error. Cancellation is
/// passed through untouched.
fn in_step<'a>(
    step: &'static str,
    plugin: &'a PluginIdentity,
) -> impl FnOnce(PluginError) -> PluginError + 'a {
    move |err| match err {
        PluginError::Cancelled => err,
        source => PluginError::Install {
            plugin: plugin.to_string(),
            step,
            source: Box::new(source),
        },
    }
}

fn check_hub_status(status: u16, plugin: &PluginIdentity) -> Result<()> {
    match classify_hub_status(status) {
        Some(HubStatus::Proceed) => Ok(()),
        Some(HubStatus::Unauthorized) => Err(PluginError::Unauthorized),
        Some(HubStatus::VersionNotFound) => Err(PluginError::VersionNotFound {
            plugin: plugin.to_string(),
        }),
        Some(HubStatus::RateLimited) => Err(PluginError::RateLimited),
        None => Err(PluginError::UnexpectedStatus {
            plugin: plugin.to_string(),
            status,
        }),
    }
}

/// Downloads plugins from GitHub releases or the Hub registry.
///
/// Concurrent calls for the same destination are not coordinated; callers
/// installing the same plugin from several tasks must serialize them.
pub struct PluginInstaller {
    github: GitHubResolver,
    hub: HubResolver,
    downloader: FileDownloader,
    platform: Platform,
    github_base_url: String,
}

impl PluginInstaller {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = HttpClient::with_config(config.http.clone())?;
        Ok(Self {
            github: GitHubResolver::new(
                http_client.clone(),
                config.github_base_url.clone(),
                config.platform.clone(),
            ),
            hub: HubResolver::new(
                http_client.clone(),
                config.api_base_url.clone(),
                config.platform.clone(),
            ),
            downloader: FileDownloader::new(
                http_client,
                config.retry,
                ProgressReporter::new(config.show_progress),
            ),
            platform: config.platform.clone(),
            github_base_url: config.github_base_url.clone(),
        })
    }

    /// Install a plugin published as a GitHub release.
    pub async fn download_from_github(
        &self,
        local_path: &Path,
        plugin: &PluginIdentity,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome> {
        let target = DownloadTarget::new(local_path);
        if !target.prepare().await? {
            log::debug!("{} already present at {}", plugin, local_path.display());
            return Ok(InstallOutcome::AlreadyPresent);
        }

        let url = self.github.resolve(plugin, cancel).await?;
        let actual = self
            .downloader
            .download(&url, target.archive_path(), cancel)
            .await
            .map_err(in_step("download", plugin))?;

        let selector = EntrySelector::GitHub {
            url: &url,
            base_url: &self.github_base_url,
            org: &plugin.org,
            name: &plugin.name,
            platform: &self.platform,
        };
        ArchiveExtractor::extract(target.archive_path(), &selector, target.path())
            .await
            .map_err(in_step("extract", plugin))?;

        log::info!("Installed {} to {}", plugin, local_path.display());
        Ok(InstallOutcome::Installed {
            path: target.path().to_path_buf(),
            // Releases publish no checksum to compare against
            checksum: ChecksumStatus::Unverified(actual),
        })
    }

    /// Install a plugin from the Hub registry.
    pub async fn download_from_hub(
        &self,
        options: &HubDownloadOptions,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome> {
        let plugin = &options.plugin;
        let target = DownloadTarget::new(&options.local_path);
        if !target.prepare().await? {
            log::debug!("{} already present at {}", plugin, target.path().display());
            return Ok(InstallOutcome::AlreadyPresent);
        }

        let request = AssetRequest {
            plugin,
            team_name: options.team_name.as_deref(),
            auth_token: options.auth_token.as_deref(),
        };
        let (asset, status) = self.hub.resolve(&request, cancel).await?;
        check_hub_status(status, plugin)?;

        let asset = asset.ok_or_else(|| PluginError::MissingAsset {
            plugin: plugin.to_string(),
        })?;
        if asset.location.is_empty() {
            return Err(PluginError::EmptyLocation);
        }

        let actual = self
            .downloader
            .download(&asset.location, target.archive_path(), cancel)
            .await
            .map_err(in_step("download", plugin))?;
        let checksum = verify_checksum(asset.checksum.as_deref(), &actual)
            .map_err(in_step("verify", plugin))?;

        let selector = EntrySelector::Hub {
            name: &plugin.name,
            version: &plugin.version,
            platform: &self.platform,
        };
        ArchiveExtractor::extract(target.archive_path(), &selector, target.path())
            .await
            .map_err(in_step("extract", plugin))?;

        log::info!("Installed {} to {}", plugin, target.path().display());
        Ok(InstallOutcome::Installed {
            path: target.path().to_path_buf(),
            checksum,
        })
    }
}
