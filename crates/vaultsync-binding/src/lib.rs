//! VaultSync Binding - account-binding consistency
//!
//! Provides:
//! - [`JsonBindingStore`] - persisted vault→account binding, one record
//!   per vault
//! - [`BindingResolver`] - account-switch conflict detection and the
//!   human-decision pipeline (pending-request table, 60 s default)

pub mod resolver;
pub mod store;

pub use resolver::{
    BindingCheck, BindingConflictRequest, BindingDecision, BindingResolver,
};
pub use store::JsonBindingStore;
