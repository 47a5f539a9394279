//! Target platform naming.
//!
//! Plugin releases are named after Go's `GOOS`/`GOARCH` values, so the Rust
//! target names are translated before they appear in URLs or archive entries.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(
            release_os(std::env::consts::OS),
            release_arch(std::env::consts::ARCH),
        )
    }

    /// `<os>_<arch>`, as used in release file names and registry targets.
    pub fn target(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Append the executable suffix for this platform.
    pub fn with_binary_suffix(&self, name: &str) -> String {
        if self.is_windows() {
            format!("{}.exe", name)
        } else {
            name.to_string()
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

fn release_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn release_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// Path of the executable for `path` on the current platform.
pub fn with_binary_suffix(path: &Path) -> PathBuf {
    if Platform::current().is_windows() {
        let mut os = path.as_os_str().to_owned();
        os.push(".exe");
        PathBuf::from(os)
    } else {
        path.to_path_buf()
    }
}
