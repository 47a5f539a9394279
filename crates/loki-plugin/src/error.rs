use std::path::PathBuf;

use thiserror::Error;

use crate::http::redact_url;

#[derive(Error, Debug)]
pub enum PluginError {
    // Resolution errors
    #[error("failed to find plugin {org}/{name} version {version}")]
    NotFound {
        org: String,
        name: String,
        version: String,
    },

    #[error("not found: {url}")]
    UrlNotFound { url: String },

    #[error("failed to download plugin {plugin}: plugin version not found. If you're trying to use a private plugin you'll need to run `loki login` first")]
    VersionNotFound { plugin: String },

    // Network errors
    #[error("unexpected status code {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("failed to get url {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed downloading URL {url:?}")]
    DownloadFailed {
        url: String,
        #[source]
        source: Box<PluginError>,
    },

    // Registry errors
    #[error("unauthorized. Try logging in via `loki login`")]
    Unauthorized,

    #[error("too many download requests. Try logging in via `loki login` to increase rate limits")]
    RateLimited,

    #[error("failed to download plugin {plugin}: unexpected status code {status}")]
    UnexpectedStatus { plugin: String, status: u16 },

    #[error("failed to get plugin url for {plugin}: missing json response")]
    MissingAsset { plugin: String },

    #[error("failed to get plugin url: empty location from response")]
    EmptyLocation,

    #[error("failed to parse registry response")]
    JsonParse(#[from] serde_json::Error),

    // Integrity errors
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    // Archive errors
    #[error("unknown plugin origin {url}")]
    UnknownOrigin { url: String },

    #[error("entry {entry} not found in plugin archive {}", .archive.display())]
    EntryNotFound { archive: PathBuf, entry: String },

    #[error("failed to open plugin archive {}", .archive.display())]
    Archive {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    // IO errors
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Pipeline errors
    #[error("failed to {step} plugin {plugin}")]
    Install {
        plugin: String,
        step: &'static str,
        #[source]
        source: Box<PluginError>,
    },

    #[error("invalid plugin kind: {0}")]
    InvalidPluginKind(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl PluginError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PluginError::Io {
            context: context.into(),
            source,
        }
    }

    /// Request failure for `url`. Signed query strings and credentials are
    /// stripped from both the stored URL and the reqwest error.
    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        PluginError::Transport {
            url: redact_url(url),
            source: source.without_url(),
        }
    }

    /// Whether another attempt of the same request could succeed.
    ///
    /// Only server-side statuses other than 404 and connection level
    /// failures qualify, including a body cut off mid-stream. Everything
    /// else is deterministic.
    pub fn is_retryable(&self) -> bool {
        match self {
            PluginError::HttpStatus { .. } => true,
            PluginError::Transport { source, .. } => {
                source.is_connect()
                    || source.is_timeout()
                    || source.is_body()
                    || source.is_decode()
            }
            _ => false,
        }
    }

    /// The error underneath the plugin and step context added by the installer.
    pub fn inner(&self) -> &PluginError {
        match self {
            PluginError::Install { source, .. } => source.inner(),
            other => other,
        }
    }

    /// Whether this error reports that the artifact does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            PluginError::NotFound { .. }
            | PluginError::UrlNotFound { .. }
            | PluginError::VersionNotFound { .. } => true,
            PluginError::DownloadFailed { source, .. } | PluginError::Install { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
