//! Single-pass writer that feeds several sinks at once.

use std::io::{self, Write};

use indicatif::ProgressBar;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Forwards every chunk to an async primary sink, then to each tap in order.
///
/// Taps run inline on the task and must not block (hashers, progress bars).
/// A chunk only counts as written once every sink accepted all of it.
pub struct FanoutWriter<'a, W> {
    primary: W,
    taps: Vec<&'a mut (dyn Write + Send)>,
}

impl<'a, W: AsyncWrite + Unpin> FanoutWriter<'a, W> {
    pub fn new(primary: W) -> Self {
        Self {
            primary,
            taps: Vec::new(),
        }
    }

    pub fn with_tap(mut self, tap: &'a mut (dyn Write + Send)) -> Self {
        self.taps.push(tap);
        self
    }

    pub async fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        self.primary.write_all(buf).await?;
        for tap in self.taps.iter_mut() {
            tap.write_all(buf)?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.primary.flush().await?;
        for tap in self.taps.iter_mut() {
            tap.flush()?;
        }
        Ok(())
    }

    /// Give back the primary sink, releasing the taps.
    pub fn into_inner(self) -> W {
        self.primary
    }
}

/// Advances a progress bar by the number of bytes written.
pub struct ProgressSink<'a>(pub &'a ProgressBar);

impl Write for ProgressSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.inc(buf.len() as u64);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
