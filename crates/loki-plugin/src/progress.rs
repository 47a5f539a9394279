//! Progress reporting for downloads.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} {bytes} ({bytes_per_sec})";

/// Hands out progress bars, or hidden ones when output is disabled.
#[derive(Debug, Clone, Copy)]
pub struct ProgressReporter {
    enabled: bool,
}

impl ProgressReporter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Byte progress bar when the size is known, a byte-counting spinner otherwise.
    pub fn download_bar(&self, message: &str, total: Option<u64>) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = match total {
            Some(total) => {
                let pb = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
                    pb.set_style(style.progress_chars("#>-"));
                }
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
                    pb.set_style(style);
                }
                pb
            }
        };
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true)
    }
}
