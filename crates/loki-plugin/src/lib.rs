//! Download loki plugin binaries.
//!
//! Plugins come either from GitHub releases, published under one of several
//! historical layouts, or from the authenticated Hub registry. Both paths end
//! the same way: a zip archive is streamed to disk next to the destination,
//! checked against its SHA-256 when one is published, and the binary for the
//! current platform is extracted to the destination with the executable bit
//! set. Existing destinations are left alone.
//!
//! ```no_run
//! use loki_plugin::{Config, PluginIdentity, PluginInstaller, PluginKind};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> loki_plugin::Result<()> {
//! let installer = PluginInstaller::new(&Config::from_env())?;
//! let plugin = PluginIdentity::new("loki", "hackernews", "v1.1.4", PluginKind::Source);
//! installer
//!     .download_from_github(Path::new(".loki/plugins/hackernews"), &plugin, &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod installer;
pub mod platform;
pub mod plugin;
pub mod progress;
pub mod repository;
pub mod retry;

pub use config::Config;
pub use downloader::ChecksumStatus;
pub use error::{PluginError, Result};
pub use installer::{DownloadTarget, HubDownloadOptions, InstallOutcome, PluginInstaller};
pub use platform::{with_binary_suffix, Platform};
pub use plugin::{PluginIdentity, PluginKind, DEFAULT_DOWNLOAD_DIR};
pub use repository::PluginAsset;
pub use retry::RetryPolicy;
