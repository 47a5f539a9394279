//! Checksum verification for downloaded archives.

use crate::{PluginError, Result};

/// Outcome of comparing a download against its published checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// The computed digest matched the expected one
    Verified(String),
    /// No checksum was published; carries the computed digest
    Unverified(String),
}

impl ChecksumStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, ChecksumStatus::Verified(_))
    }

    /// The digest computed over the downloaded bytes.
    pub fn actual(&self) -> &str {
        match self {
            ChecksumStatus::Verified(actual) | ChecksumStatus::Unverified(actual) => actual,
        }
    }
}

/// Compare the computed SHA-256 against the expected one.
///
/// The comparison is exact: digests are published lowercase, and anything
/// else is treated as a mismatch. A missing or empty expectation is not an
/// error, but it is never reported as verified.
pub fn verify_checksum(expected: Option<&str>, actual: &str) -> Result<ChecksumStatus> {
    match expected.filter(|e| !e.is_empty()) {
        None => {
            log::warn!("Warning - checksum not verified: {}", actual);
            Ok(ChecksumStatus::Unverified(actual.to_string()))
        }
        Some(expected) if expected == actual => Ok(ChecksumStatus::Verified(actual.to_string())),
        Some(expected) => Err(PluginError::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }),
    }
}
