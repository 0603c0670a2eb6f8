//! VaultSync Sync - the synchronization engine
//!
//! Ties the domain, index, transport, and binding crates together:
//!
//! - [`SyncEngine`] - runs diff→commit rounds, one at a time per vault
//! - [`SyncScheduler`] - debounces watcher events into round triggers
//! - [`SyncStateManager`] - status state machine with throttled broadcast
//! - [`TokioLocalVault`] - file I/O under the vault root
//!
//! ## Round Flow
//!
//! ```text
//! ChangeEvent ──→ SyncScheduler ──→ SyncEngine.sync()
//!                                       │
//!                    binding check → inventory → diff → actions → commit
//!                                       │
//!                                 SyncStateManager ──→ observers
//! ```

pub mod engine;
pub mod status;
pub mod throttle;
pub mod trigger;
pub mod vault;

pub use engine::{RoundOutcome, RoundSummary, SyncEngine};
pub use status::{EngineStatus, SubscriptionHandle, SyncStateManager, SyncStatusSnapshot};
pub use throttle::TrailingThrottle;
pub use trigger::{SyncRequest, SyncScheduler};
pub use vault::TokioLocalVault;
