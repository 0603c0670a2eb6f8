//! VaultSync Index - Local file index and persistence
//!
//! Provides:
//! - [`FileIndex`] - the in-memory index mapping path ↔ stable file id,
//!   owning every mutation rule (clock increments, baseline advances,
//!   wholesale remote adoption)
//! - [`JsonIndexStore`] - versioned, atomically-written JSON persistence,
//!   one file per vault

pub mod index;
pub mod store;

pub use index::{FileIndex, SyncedRemoteFile};
pub use store::JsonIndexStore;
