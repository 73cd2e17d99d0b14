//! Persistence, availability, and calendar publication collaborators.
//!
//! The traits describe the external services the core consumes; the
//! in-memory implementations back tests and embedded use.

mod memory;
mod traits;

pub use memory::{InMemoryRecordStore, RecordingPublisher};
pub use traits::{AvailabilityService, CalendarPublisher, RecordStore, WriteAction};
