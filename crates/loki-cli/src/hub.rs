//! Hub command - install a plugin from the loki Hub registry.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use loki_plugin::{Config, HubDownloadOptions, PluginIdentity, PluginInstaller, PluginKind};

#[derive(Args, Debug)]
pub struct HubArgs {
    /// Team that owns the plugin on the Hub
    #[arg(long)]
    pub team: String,

    /// Plugin name (e.g. aws)
    #[arg(long)]
    pub name: String,

    /// Plugin version (e.g. v22.18.0)
    #[arg(long)]
    pub version: String,

    /// Plugin kind: source or destination
    #[arg(long, default_value = "source")]
    pub kind: PluginKind,

    /// Team to download as, for plugins not published publicly
    #[arg(long)]
    pub team_name: Option<String>,

    /// API token, as printed by `loki login`
    #[arg(long, env = "LOKI_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Destination of the plugin binary
    #[arg(long)]
    pub path: Option<PathBuf>,
}

pub async fn execute(args: HubArgs, show_progress: bool) -> Result<i32> {
    let plugin = PluginIdentity::new(args.team, args.name, args.version, args.kind);
    let path = super::resolve_path(args.path, &plugin)?;

    let config = Config::from_env().with_progress(show_progress);
    let installer = PluginInstaller::new(&config).context("Failed to set up HTTP client")?;

    if args.token.is_none() {
        log::debug!("No API token set, requesting {} anonymously", plugin);
    }

    let options = HubDownloadOptions {
        auth_token: args.token,
        team_name: args.team_name,
        local_path: path.clone(),
        plugin,
    };

    let cancel = super::cancel_on_ctrl_c();
    let outcome = installer
        .download_from_hub(&options, &cancel)
        .await?;

    super::report(&outcome, &path);
    Ok(0)
}
