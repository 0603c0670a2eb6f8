//! Domain entities and value types
//!
//! Pure business logic: no I/O, no adapter dependencies. Everything here is
//! deterministic and unit-testable in isolation.

pub mod binding;
pub mod clock;
pub mod errors;
pub mod file_entry;
pub mod newtypes;

pub use binding::Binding;
pub use clock::{ClockOrdering, VectorClock};
pub use errors::DomainError;
pub use file_entry::FileEntry;
