//! Fixed-delay retry loop.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{PluginError, Result};

pub const DEFAULT_ATTEMPTS: u32 = 5;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// How often, and how far apart, a failing operation is attempted.
///
/// Whether a failure is worth another attempt is decided by
/// [`PluginError::is_retryable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails terminally or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// unchanged when attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.max_attempts {
                return Err(err);
            }

            let cause = std::error::Error::source(&err)
                .map(|source| format!(" ({})", source))
                .unwrap_or_default();
            log::warn!(
                "Attempt {}/{} failed: {}{}. Retrying in {:?}",
                attempt,
                self.max_attempts,
                err,
                cause,
                self.delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PluginError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
            attempt += 1;
        }
    }
}
