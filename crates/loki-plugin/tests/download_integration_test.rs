/// Integration tests for plugin installation
///
/// These tests run the full resolve, download, verify and extract pipeline
/// against a local mock server standing in for GitHub and the Hub registry.

use httpmock::Method::HEAD;
use httpmock::prelude::*;
use loki_plugin::{
    ChecksumStatus, Config, HubDownloadOptions, InstallOutcome, Platform, PluginError,
    PluginIdentity, PluginInstaller, PluginKind, RetryPolicy,
};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn sha256(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn installer(server: &MockServer, platform: Platform) -> PluginInstaller {
    let config = Config::new()
        .with_api_base_url(server.base_url())
        .with_github_base_url(server.base_url())
        .with_platform(platform)
        .with_retry(RetryPolicy::new(5, Duration::from_millis(10)))
        .with_progress(false);
    PluginInstaller::new(&config).unwrap()
}

fn linux() -> Platform {
    Platform::new("linux", "amd64")
}

fn hub_options(local_path: &Path, plugin: PluginIdentity) -> HubDownloadOptions {
    HubDownloadOptions {
        auth_token: None,
        team_name: None,
        local_path: local_path.to_path_buf(),
        plugin,
    }
}

fn aws() -> PluginIdentity {
    PluginIdentity::new("loki", "aws", "v22.18.0", PluginKind::Source)
}

const AWS_ASSET_PATH: &str = "/plugins/loki/source/aws/versions/v22.18.0/assets/linux_amd64";

#[tokio::test]
async fn test_github_source_install_is_idempotent() {
    let server = MockServer::start_async().await;
    let release = "/loki/loki-source-hackernews/releases/download/v1.1.4/loki-source-hackernews_linux_amd64.zip";
    let archive = zip_bytes(&[
        ("loki-source-hackernews", "hackernews linux binary"),
        ("README.md", "docs"),
    ]);

    let probe = server
        .mock_async(|when, then| {
            when.method(HEAD).path(release);
            then.status(200);
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET).path(release);
            then.status(200).body(&archive);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("plugins/hackernews/plugin");
    let plugin = PluginIdentity::new("loki", "hackernews", "v1.1.4", PluginKind::Source);
    let installer = installer(&server, linux());
    let cancel = CancellationToken::new();

    let outcome = installer
        .download_from_github(&dest, &plugin, &cancel)
        .await
        .unwrap();

    match outcome {
        InstallOutcome::Installed { path, checksum } => {
            assert_eq!(path, dest);
            assert_eq!(checksum, ChecksumStatus::Unverified(sha256(&archive)));
        }
        other => panic!("expected Installed, got {:?}", other),
    }
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hackernews linux binary");
    assert!(temp_dir.path().join("plugins/hackernews/plugin.zip").exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_ne!(mode & 0o100, 0);
    }

    let again = installer
        .download_from_github(&dest, &plugin, &cancel)
        .await
        .unwrap();
    assert_eq!(again, InstallOutcome::AlreadyPresent);

    probe.assert_hits_async(1).await;
    download.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_github_falls_back_to_monorepo() {
    let server = MockServer::start_async().await;
    let per_repo = "/pixis/loki-destination-postgresql/releases/download/v2.0.7/loki-destination-postgresql_linux_amd64.zip";
    let monorepo = "/pixis/loki/releases/download/plugins-destination-postgresql-v2.0.7/postgresql_linux_amd64.zip";
    let archive = zip_bytes(&[("plugins/destination/postgresql", "postgresql binary")]);

    server
        .mock_async(|when, then| {
            when.method(HEAD).path(per_repo);
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(HEAD).path(monorepo);
            then.status(200);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(monorepo);
            then.status(200).body(&archive);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("plugin");
    let plugin = PluginIdentity::new("pixis", "postgresql", "v2.0.7", PluginKind::Destination);

    installer(&server, linux())
        .download_from_github(&dest, &plugin, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "postgresql binary");
}

#[tokio::test]
async fn test_github_windows_entry_has_exe_suffix() {
    let server = MockServer::start_async().await;
    let release = "/loki/loki-source-hackernews/releases/download/v1.1.4/loki-source-hackernews_windows_amd64.zip";
    let archive = zip_bytes(&[
        ("loki-source-hackernews", "wrong binary"),
        ("loki-source-hackernews.exe", "windows binary"),
    ]);

    server
        .mock_async(|when, then| {
            when.method(HEAD).path(release);
            then.status(200);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(release);
            then.status(200).body(&archive);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("plugin");
    let plugin = PluginIdentity::new("loki", "hackernews", "v1.1.4", PluginKind::Source);

    installer(&server, Platform::new("windows", "amd64"))
        .download_from_github(&dest, &plugin, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "windows binary");
}

#[tokio::test]
async fn test_github_missing_plugin() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(HEAD);
            then.status(404);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("plugin");
    let plugin = PluginIdentity::new("not-loki", "invalid-plugin", "v0.0.x", PluginKind::Source);

    let err = installer(&server, linux())
        .download_from_github(&dest, &plugin, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PluginError::NotFound { .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_hub_install_verifies_checksum() {
    let server = MockServer::start_async().await;
    let archive = zip_bytes(&[
        ("plugin-aws-v22.18.0-linux-amd64", "aws linux binary"),
        ("plugin-aws-v22.18.0-darwin-arm64", "aws darwin binary"),
    ]);
    let checksum = sha256(&archive);
    let location = format!("{}?X-Amz-Signature=secret", server.url("/download/aws.zip"));
    let asset_body = serde_json::json!({ "location": location, "checksum": checksum }).to_string();

    let asset = server
        .mock_async(|when, then| {
            when.method(GET).path(AWS_ASSET_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(&asset_body);
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/download/aws.zip")
                .query_param("X-Amz-Signature", "secret");
            then.status(200).body(&archive);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("aws/plugin");
    let installer = installer(&server, linux());
    let cancel = CancellationToken::new();

    let outcome = installer
        .download_from_hub(&hub_options(&dest, aws()), &cancel)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        InstallOutcome::Installed {
            path: dest.clone(),
            checksum: ChecksumStatus::Verified(checksum),
        }
    );
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "aws linux binary");

    let again = installer
        .download_from_hub(&hub_options(&dest, aws()), &cancel)
        .await
        .unwrap();
    assert_eq!(again, InstallOutcome::AlreadyPresent);
    asset.assert_hits_async(1).await;
    download.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_hub_detects_altered_archive() {
    let server = MockServer::start_async().await;
    let archive = zip_bytes(&[("plugin-aws-v22.18.0-linux-amd64", "aws linux binary")]);
    let checksum = sha256(&archive);

    let mut tampered = archive.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;

    let asset_body = serde_json::json!({
        "location": server.url("/download/aws.zip"),
        "checksum": checksum,
    })
    .to_string();
    server
        .mock_async(|when, then| {
            when.method(GET).path(AWS_ASSET_PATH);
            then.status(200).body(&asset_body);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/download/aws.zip");
            then.status(200).body(&tampered);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("plugin");

    let err = installer(&server, linux())
        .download_from_hub(&hub_options(&dest, aws()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "failed to verify plugin source loki/aws@v22.18.0");
    match err.inner() {
        PluginError::ChecksumMismatch { expected, actual } => {
            assert_eq!(expected, &checksum);
            assert_eq!(actual, &sha256(&tampered));
        }
        other => panic!("expected ChecksumMismatch, got {:?}", other),
    }
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_hub_without_checksum_is_unverified() {
    let server = MockServer::start_async().await;
    let archive = zip_bytes(&[("plugin-aws-v22.18.0-linux-amd64", "aws linux binary")]);
    let asset_body = serde_json::json!({ "location": server.url("/download/aws.zip") }).to_string();

    server
        .mock_async(|when, then| {
            when.method(GET).path(AWS_ASSET_PATH);
            then.status(200).body(&asset_body);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/download/aws.zip");
            then.status(200).body(&archive);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("plugin");

    let outcome = installer(&server, linux())
        .download_from_hub(&hub_options(&dest, aws()), &CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        InstallOutcome::Installed { checksum, .. } => {
            assert!(!checksum.is_verified());
            assert_eq!(checksum.actual(), sha256(&archive));
        }
        other => panic!("expected Installed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_hub_team_endpoint_with_token() {
    let server = MockServer::start_async().await;
    let archive = zip_bytes(&[("plugin-aws-v22.18.0-linux-amd64", "aws linux binary")]);
    let asset_body = serde_json::json!({
        "location": server.url("/download/aws.zip"),
        "checksum": sha256(&archive),
    })
    .to_string();

    let asset = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/teams/my-team{}", AWS_ASSET_PATH))
                .header("Authorization", "Bearer token-123");
            then.status(200).body(&asset_body);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/download/aws.zip");
            then.status(200).body(&archive);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("plugin");
    let options = HubDownloadOptions {
        auth_token: Some("token-123".to_string()),
        team_name: Some("my-team".to_string()),
        ..hub_options(&dest, aws())
    };

    installer(&server, linux())
        .download_from_hub(&options, &CancellationToken::new())
        .await
        .unwrap();

    asset.assert_hits_async(1).await;
    assert!(dest.exists());
}

#[tokio::test]
async fn test_hub_status_codes_are_classified() {
    let cases: [(u16, fn(&PluginError) -> bool); 4] = [
        (401, |e| matches!(e, PluginError::Unauthorized)),
        (404, |e| matches!(e, PluginError::VersionNotFound { .. })),
        (429, |e| matches!(e, PluginError::RateLimited)),
        (500, |e| matches!(e, PluginError::UnexpectedStatus { status: 500, .. })),
    ];

    for (status, expected) in cases {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(AWS_ASSET_PATH);
                then.status(status);
            })
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("plugin");
        let err = installer(&server, linux())
            .download_from_hub(&hub_options(&dest, aws()), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(expected(&err), "status {} produced {:?}", status, err);
        assert!(!dest.exists());
    }
}

#[tokio::test]
async fn test_hub_archive_without_platform_entry() {
    let server = MockServer::start_async().await;
    let archive = zip_bytes(&[("plugin-aws-v22.18.0-darwin-arm64", "aws darwin binary")]);
    let asset_body = serde_json::json!({
        "location": server.url("/download/aws.zip"),
        "checksum": sha256(&archive),
    })
    .to_string();

    server
        .mock_async(|when, then| {
            when.method(GET).path(AWS_ASSET_PATH);
            then.status(200).body(&asset_body);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/download/aws.zip");
            then.status(200).body(&archive);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("plugin");

    let err = installer(&server, linux())
        .download_from_hub(&hub_options(&dest, aws()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PluginError::Install { step: "extract", .. }));
    assert!(matches!(err.inner(), PluginError::EntryNotFound { .. }));
    assert!(!dest.exists());
    assert!(temp_dir.path().join("plugin.zip").exists());
}

#[tokio::test]
async fn test_hub_empty_location() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(AWS_ASSET_PATH);
            then.status(200).body(r#"{"location":""}"#);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let err = installer(&server, linux())
        .download_from_hub(
            &hub_options(&temp_dir.path().join("plugin"), aws()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PluginError::EmptyLocation));
}

#[tokio::test]
async fn test_hub_download_errors_hide_signature() {
    use std::error::Error as _;

    let server = MockServer::start_async().await;
    let location = format!("{}?X-Amz-Signature=secret", server.url("/download/aws.zip"));
    let asset_body = serde_json::json!({ "location": location }).to_string();

    server
        .mock_async(|when, then| {
            when.method(GET).path(AWS_ASSET_PATH);
            then.status(200).body(&asset_body);
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET).path("/download/aws.zip");
            then.status(503);
        })
        .await;

    let temp_dir = TempDir::new().unwrap();
    let err = installer(&server, linux())
        .download_from_hub(
            &hub_options(&temp_dir.path().join("plugin"), aws()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err.inner(), PluginError::DownloadFailed { .. }));
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    assert_eq!(chain[0], "failed to download plugin source loki/aws@v22.18.0");
    assert!(chain.iter().all(|m| !m.contains("secret")), "{:?}", chain);
    download.assert_hits_async(5).await;
}
