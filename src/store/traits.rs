//! Collaborator trait definitions.
//!
//! The core consumes persistence, availability, and calendar publication as
//! opaque services. The persistence collaborator must guarantee atomic
//! compare-and-swap semantics on the version token: a write either applies
//! fully or returns a conflict with nothing changed.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::record::{
    EditScope, LifecycleAction, OccurrenceException, RecordStatus, ReservationPatch,
    ReservationRecord, SchedulingConflict, VersionToken,
};

/// The kind of write being attempted. The action travels with the write so
/// the store can enforce lifecycle transitions and classify conflicts.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteAction {
    /// Persist edited content. Writes against a recurring series must carry
    /// an edit scope.
    Save { scope: Option<EditScope> },
    /// draft -> pending, after full required-field validation.
    Submit,
    /// pending -> approved. `force` bypasses the scheduling re-check and is
    /// a gated policy decision, never a default.
    Approve { force: bool },
    /// pending -> rejected, with a mandatory non-empty reason.
    Reject { reason: String },
    /// Soft delete. With a this-occurrence scope on a series master, the
    /// store materializes a cancelling exception instead.
    Delete { scope: Option<EditScope> },
    /// deleted -> the remembered prior status.
    Restore,
}

impl WriteAction {
    /// Get a human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            WriteAction::Save { .. } => "save",
            WriteAction::Submit => "submit",
            WriteAction::Approve { .. } => "approve",
            WriteAction::Reject { .. } => "reject",
            WriteAction::Delete { .. } => "delete",
            WriteAction::Restore => "restore",
        }
    }

    /// The lifecycle transition this write performs, if any.
    pub fn lifecycle(&self) -> Option<LifecycleAction> {
        match self {
            WriteAction::Save { .. } => None,
            WriteAction::Submit => Some(LifecycleAction::Submit),
            WriteAction::Approve { .. } => Some(LifecycleAction::Approve),
            WriteAction::Reject { .. } => Some(LifecycleAction::Reject),
            WriteAction::Delete { .. } => Some(LifecycleAction::Delete),
            WriteAction::Restore => Some(LifecycleAction::Restore),
        }
    }
}

/// Trait for the persistence collaborator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record with its current version token.
    async fn get(&self, id: &str) -> Result<Option<ReservationRecord>>;

    /// Create a brand-new record (e.g. persisting an in-progress draft).
    async fn create(&self, record: ReservationRecord) -> Result<ReservationRecord>;

    /// Apply a version-guarded write. `expected_version` is the baseline
    /// observed at session open (or returned by the previous write in a
    /// save-then-approve sequence); `expected_status` is the status the
    /// editor believes the record is in, used to classify conflicts.
    ///
    /// Returns the updated record with its new version token, or
    /// `ConflictError::Version` with a [`crate::record::ConflictReport`] and
    /// nothing applied.
    async fn write(
        &self,
        id: &str,
        expected_version: &VersionToken,
        expected_status: RecordStatus,
        patch: ReservationPatch,
        action: WriteAction,
    ) -> Result<ReservationRecord>;

    /// List stored per-occurrence exceptions for a series master within a
    /// date window.
    async fn list_exceptions(
        &self,
        series_master_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<OccurrenceException>>;
}

/// Trait for the availability query collaborator. Consulted before approval
/// so conflicts surface pre-emptively; the approve write re-checks
/// authoritatively on its own.
#[async_trait]
pub trait AvailabilityService: Send + Sync {
    /// Scheduling conflicts between a candidate booking (with a buffer
    /// applied around its window) and approved bookings.
    async fn check_window(
        &self,
        candidate: &ReservationRecord,
        buffer_minutes: i64,
    ) -> Result<Vec<SchedulingConflict>>;
}

/// Trait for the calendar publication collaborator. Invoked once per
/// approval, after content is durably saved.
#[async_trait]
pub trait CalendarPublisher: Send + Sync {
    /// Publish an approved record to the external calendar; returns the
    /// external event identifier to store alongside the record.
    async fn publish(&self, record: &ReservationRecord) -> Result<String>;
}
