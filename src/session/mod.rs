//! Edit session coordination: working copy, two-phase confirmation, review
//! hold lifecycle, and conflict rendering.

mod coordinator;
mod diff;

pub use coordinator::{
    ActionOutcome, CloseOutcome, CommitKind, ConfirmableAction, EditSession, LeaseStatus,
    SessionServices, SessionState,
};
pub use diff::{diff_records, FieldChange, SessionConflict};
