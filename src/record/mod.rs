//! Reservation record model: the shared entity, its lifecycle state machine,
//! partial updates, and the conflict types produced when a guarded write is
//! rejected.

mod lifecycle;
mod types;

pub use lifecycle::{next_status, LifecycleAction};
pub use types::{
    ConflictKind, ConflictReport, EditScope, OccurrenceException, RecordKind, RecordStatus,
    ReservationPatch, ReservationRecord, SchedulingConflict, VersionToken,
};
