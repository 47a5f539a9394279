mod github;
mod hub;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use loki_plugin::{with_binary_suffix, ChecksumStatus, InstallOutcome, PluginIdentity};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "loki-plugin")]
#[command(about = "Download loki plugin binaries")]
#[command(version)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hide download progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a plugin published as a GitHub release
    Github(github::GithubArgs),

    /// Download a plugin from the loki Hub
    Hub(hub::HubArgs),
}

/// Where the plugin goes when `--path` is not given.
fn resolve_path(path: Option<PathBuf>, plugin: &PluginIdentity) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => {
            let cwd = std::env::current_dir()?;
            Ok(with_binary_suffix(&plugin.default_local_path(&cwd)))
        }
    }
}

fn report(outcome: &InstallOutcome, path: &Path) {
    match outcome {
        InstallOutcome::AlreadyPresent => {
            println!(
                "{} Plugin already present at {}",
                style("Info:").cyan(),
                path.display()
            );
        }
        InstallOutcome::Installed { path, checksum } => {
            println!(
                "{} Installed plugin to {}",
                style("Success:").green().bold(),
                path.display()
            );
            match checksum {
                ChecksumStatus::Verified(sum) => {
                    println!("  sha256 {} {}", sum, style("(verified)").green());
                }
                ChecksumStatus::Unverified(sum) => {
                    println!("  sha256 {} {}", sum, style("(not verified)").yellow());
                }
            }
        }
    }
}

/// Cancel the token on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling download");
            token.cancel();
        }
    });
    cancel
}

fn run() -> Result<i32> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| anyhow::anyhow!("Failed to create async runtime: {}", e))?;

    let show_progress = !args.no_progress;
    match args.command {
        Commands::Github(github_args) => rt.block_on(github::execute(github_args, show_progress)),
        Commands::Hub(hub_args) => rt.block_on(hub::execute(hub_args, show_progress)),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
