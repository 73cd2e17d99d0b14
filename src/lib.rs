//! Rota: Room and Event Reservation Calendar Core
//!
//! Version-guarded reservation records with a recurrence engine, a soft
//! advisory review hold, an approval lifecycle, and an edit session
//! coordinator that ties them together.

pub mod config;
pub mod error;
pub mod lock;
pub mod record;
pub mod recurrence;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{
    ConfigError, ConflictError, LockError, Result, RotaError, SessionError, StoreError,
    ValidationError,
};
pub use lock::{AcquireOutcome, InMemoryLockService, LockService, ReviewHold};
pub use record::{
    next_status, ConflictKind, ConflictReport, EditScope, LifecycleAction, OccurrenceException,
    RecordKind, RecordStatus, ReservationPatch, ReservationRecord, SchedulingConflict,
    VersionToken,
};
pub use recurrence::{
    EndCondition, Frequency, Recurrence, RecurrencePattern, RecurrenceRange,
};
pub use session::{
    ActionOutcome, CloseOutcome, CommitKind, ConfirmableAction, EditSession, FieldChange,
    LeaseStatus, SessionConflict, SessionServices, SessionState,
};
pub use store::{
    AvailabilityService, CalendarPublisher, InMemoryRecordStore, RecordStore, RecordingPublisher,
    WriteAction,
};
