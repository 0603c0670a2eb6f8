//! VaultSync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `VectorClock`, `FileEntry`, `Binding`
//! - **Port definitions** - Traits for adapters: `ISyncTransport`, `IIndexStore`,
//!   `IBindingStore`, `ILocalVault`
//! - **Error taxonomy** - `SyncError`, the classification that drives retry
//!   and status policy
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement. The sync
//! engine orchestrates domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
