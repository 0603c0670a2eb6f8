//! Port definitions (trait interfaces for adapters)
//!
//! Ports are the seams between the domain core and the outside world.
//! Adapter crates implement these traits; the sync engine consumes them
//! through `Arc<dyn Trait>` references, which keeps every component
//! substitutable in tests.

pub mod binding_store;
pub mod index_store;
pub mod local_vault;
pub mod sync_transport;
