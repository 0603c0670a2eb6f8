//! VaultSync API - HTTP sync transport
//!
//! Implements [`ISyncTransport`](vaultsync_core::ports::sync_transport::ISyncTransport)
//! over the JSON/HTTPS contract: diff, commit, transfer URLs, the vectorize
//! side channel, usage, and the current-user endpoint.

pub mod client;
pub mod transport;

pub use client::ApiClient;
pub use transport::HttpSyncTransport;
