//! Github command - install a plugin from a GitHub release.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use loki_plugin::{Config, PluginIdentity, PluginInstaller, PluginKind};

#[derive(Args, Debug)]
pub struct GithubArgs {
    /// Organization that publishes the plugin
    #[arg(long)]
    pub org: String,

    /// Plugin name (e.g. hackernews)
    #[arg(long)]
    pub name: String,

    /// Release version (e.g. v1.1.4)
    #[arg(long)]
    pub version: String,

    /// Plugin kind: source or destination
    #[arg(long, default_value = "source")]
    pub kind: PluginKind,

    /// Destination of the plugin binary
    #[arg(long)]
    pub path: Option<PathBuf>,
}

pub async fn execute(args: GithubArgs, show_progress: bool) -> Result<i32> {
    let plugin = PluginIdentity::new(args.org, args.name, args.version, args.kind);
    let path = super::resolve_path(args.path, &plugin)?;

    let config = Config::from_env().with_progress(show_progress);
    let installer = PluginInstaller::new(&config).context("Failed to set up HTTP client")?;

    let cancel = super::cancel_on_ctrl_c();
    let outcome = installer
        .download_from_github(&path, &plugin, &cancel)
        .await?;

    super::report(&outcome, &path);
    Ok(0)
}
