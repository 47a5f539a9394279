//! Streaming archive downloader.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::{Response, StatusCode};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio_util::sync::CancellationToken;

use crate::http::{redact_url, HttpClient};
use crate::progress::ProgressReporter;
use crate::retry::RetryPolicy;
use crate::{PluginError, Result};

use super::fanout::{FanoutWriter, ProgressSink};

/// Downloads a URL to disk, hashing it on the way.
pub struct FileDownloader {
    http_client: HttpClient,
    retry: RetryPolicy,
    progress: ProgressReporter,
}

impl FileDownloader {
    pub fn new(http_client: HttpClient, retry: RetryPolicy, progress: ProgressReporter) -> Self {
        Self {
            http_client,
            retry,
            progress,
        }
    }

    /// Download `url` to `dest` and return the SHA-256 of the body as lowercase hex.
    ///
    /// The whole request is retried on transient failures. A 404 is returned
    /// as [`PluginError::UrlNotFound`] without retrying. Exhausted retries are
    /// wrapped in [`PluginError::DownloadFailed`] with the last cause.
    pub async fn download(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> Result<String> {
        let result = self
            .retry
            .run(cancel, move |attempt| self.download_once(url, dest, attempt, cancel))
            .await;

        match result {
            Ok(checksum) => Ok(checksum),
            Err(err) => {
                // Whatever is on disk is incomplete
                let _ = tokio::fs::remove_file(dest).await;
                if err.is_retryable() {
                    Err(PluginError::DownloadFailed {
                        url: redact_url(url),
                        source: Box::new(err),
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn download_once(
        &self,
        url: &str,
        dest: &Path,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let response = self.http_client.get(url, cancel).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PluginError::UrlNotFound {
                url: redact_url(url),
            });
        }
        if !status.is_success() {
            return Err(PluginError::HttpStatus {
                status: status.as_u16(),
                url: redact_url(url),
            });
        }

        if attempt > 1 {
            log::info!("Downloading {} (attempt {})", redact_url(url), attempt);
        } else {
            log::info!("Downloading {}", redact_url(url));
        }

        // Truncates whatever a previous attempt left behind
        let file = File::create(dest).await.map_err(|e| {
            PluginError::io(format!("failed to create file {}", dest.display()), e)
        })?;
        let mut hasher = Sha256::new();
        let bar = self
            .progress
            .download_bar("Downloading", response.content_length());

        let copied = {
            let mut progress = ProgressSink(&bar);
            let mut writer = FanoutWriter::new(file)
                .with_tap(&mut hasher)
                .with_tap(&mut progress);
            let result = copy_body(response, &mut writer, url, dest, cancel).await;
            result.map(|written| (written, writer.into_inner()))
        };

        let (written, file) = match copied {
            Ok(copied) => {
                bar.finish_and_clear();
                copied
            }
            Err(err) => {
                bar.abandon();
                return Err(err);
            }
        };

        file.sync_all().await.map_err(|e| {
            PluginError::io(format!("failed to flush file {}", dest.display()), e)
        })?;
        log::debug!("Wrote {} bytes to {}", written, dest.display());

        Ok(format!("{:x}", hasher.finalize()))
    }
}

async fn copy_body(
    response: Response,
    writer: &mut FanoutWriter<'_, File>,
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PluginError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(|e| PluginError::transport(url, e))?;

        writer.write_chunk(&chunk).await.map_err(|e| {
            PluginError::io(format!("failed to copy body to file {}", dest.display()), e)
        })?;
        written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| {
        PluginError::io(format!("failed to copy body to file {}", dest.display()), e)
    })?;
    Ok(written)
}
