//! Plugin archive downloading and extraction module.
//!
//! This module streams archives to disk while hashing them, checks the
//! result against a published checksum, and pulls the platform binary out
//! of the archive.

mod archive;
mod checksum;
mod fanout;
mod file;

pub use archive::{ArchiveExtractor, EntrySelector};
pub use checksum::{verify_checksum, ChecksumStatus};
pub use fanout::{FanoutWriter, ProgressSink};
pub use file::FileDownloader;
