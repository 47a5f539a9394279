//! HTTP plumbing.

mod client;

pub use client::{redact_url, HttpClient, HttpClientConfig};
