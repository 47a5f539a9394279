//! Locating plugin archives.
//!
//! - [`GitHubResolver`] probes the public release layouts.
//! - [`HubResolver`] asks the authenticated registry for a signed location.

mod github;
mod hub;

pub use github::{Convention, GitHubResolver, Layout, CONVENTIONS, MONOREPO_NAME, MONOREPO_OWNER};
pub use hub::{AssetRequest, HubResolver, PluginAsset};
