//! Plugin identity types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PluginError;

/// Directory, relative to a project root, that holds downloaded plugins.
pub const DEFAULT_DOWNLOAD_DIR: &str = ".loki";

/// Role a plugin plays in a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Source,
    Destination,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Source => "source",
            PluginKind::Destination => "destination",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginKind {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(PluginKind::Source),
            "destination" => Ok(PluginKind::Destination),
            other => Err(PluginError::InvalidPluginKind(other.to_string())),
        }
    }
}

/// The plugin a download request is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentity {
    /// GitHub organization or Hub team that publishes the plugin
    pub org: String,
    pub name: String,
    /// Release tag, e.g. `v1.1.4`
    pub version: String,
    pub kind: PluginKind,
}

impl PluginIdentity {
    pub fn new(
        org: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        kind: PluginKind,
    ) -> Self {
        Self {
            org: org.into(),
            name: name.into(),
            version: version.into(),
            kind,
        }
    }

    /// Conventional install location below `root`:
    /// `<root>/.loki/plugins/<kind>/<org>/<name>/<version>/plugin`.
    pub fn default_local_path(&self, root: &Path) -> PathBuf {
        root.join(DEFAULT_DOWNLOAD_DIR)
            .join("plugins")
            .join(self.kind.as_str())
            .join(&self.org)
            .join(&self.name)
            .join(&self.version)
            .join("plugin")
    }
}

impl fmt::Display for PluginIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}@{}", self.kind, self.org, self.name, self.version)
    }
}
