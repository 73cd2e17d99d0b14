//! Reservation record types.
//!
//! A [`ReservationRecord`] is the one truly shared entity: it is owned by the
//! persistence collaborator, and the core only ever holds a transient working
//! copy during an edit session. Every read carries the record's opaque
//! [`VersionToken`]; every write must present the token observed at session
//! open.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ValidationError};
use crate::recurrence::Recurrence;

// ============================================================================
// Version Token
// ============================================================================

/// Opaque value representing a record's current state for compare-and-swap
/// writes. Tokens are only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct VersionToken(String);

impl VersionToken {
    /// Mint a fresh token.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Lifecycle Status
// ============================================================================

/// Lifecycle status of a reservation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Being composed by the requester; not yet submitted.
    #[default]
    Draft,
    /// Submitted and awaiting review.
    Pending,
    /// Approved and published to the shared calendar.
    Approved,
    /// Rejected by a reviewer, with a mandatory reason.
    Rejected,
    /// Soft-deleted; recoverable by an administrator.
    Deleted,
}

impl RecordStatus {
    /// Get a human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            RecordStatus::Draft => "Draft",
            RecordStatus::Pending => "Pending",
            RecordStatus::Approved => "Approved",
            RecordStatus::Rejected => "Rejected",
            RecordStatus::Deleted => "Deleted",
        }
    }

    /// Whether a reviewer has already taken a final action.
    pub fn is_actioned(&self) -> bool {
        matches!(self, RecordStatus::Approved | RecordStatus::Rejected)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Record Kind
// ============================================================================

/// The concrete kind of a record, decided once at load time and never
/// re-inferred from which optional fields happen to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A room reservation request.
    #[default]
    RoomReservation,
    /// A unified event spanning rooms and external calendars.
    UnifiedEvent,
    /// An event imported from the legacy calendar integration.
    LegacyCalendarEvent,
}

// ============================================================================
// Edit Scope
// ============================================================================

/// Whether an edit or approval targets one occurrence or the entire series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum EditScope {
    /// The mutation applies to a single expanded instance; the collaborator
    /// materializes an exception for this date.
    ThisOccurrence { date: NaiveDate },
    /// The mutation applies to the series master pattern.
    AllOccurrences,
}

// ============================================================================
// Reservation Record
// ============================================================================

/// The mutable shared reservation/event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReservationRecord {
    /// Unique identifier.
    pub id: String,
    /// Record kind, fixed at load time.
    pub kind: RecordKind,
    /// Title; required before the record may even be saved as a draft.
    pub title: String,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Room being reserved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Identity of the requester.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    /// Start of the booking.
    pub start: DateTime<Utc>,
    /// End of the booking (None for point-in-time entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: RecordStatus,
    /// Status before a soft delete, restored by `restore`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<RecordStatus>,
    /// Opaque version token for compare-and-swap writes.
    pub version: VersionToken,
    /// Recurrence definition when this record is a series master.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    /// Back-reference to the series master when this record is one concrete
    /// occurrence of a series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_master_id: Option<String>,
    /// The occurrence date when this record is one concrete occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrence_date: Option<NaiveDate>,
    /// Mandatory reason recorded on rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// External calendar event id, stored after publication on approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_event_id: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ReservationRecord {
    /// Create a new draft record.
    pub fn new(title: impl Into<String>, start: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: RecordKind::RoomReservation,
            title: title.into(),
            description: None,
            room_id: None,
            requester: None,
            start,
            end: None,
            status: RecordStatus::Draft,
            previous_status: None,
            version: VersionToken::fresh(),
            recurrence: None,
            series_master_id: None,
            occurrence_date: None,
            rejection_reason: None,
            external_event_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a record with a specific ID.
    pub fn with_id(id: impl Into<String>, title: impl Into<String>, start: DateTime<Utc>) -> Self {
        let mut record = Self::new(title, start);
        record.id = id.into();
        record
    }

    /// Set the record kind.
    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the room.
    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// Set the requester identity.
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    /// Set the end time.
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Set the duration (calculates end time).
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.end = Some(self.start + duration);
        self
    }

    /// Set the lifecycle status.
    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    /// Set recurrence, making this record a series master.
    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Whether this record defines a recurring series.
    pub fn is_series_master(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Whether this record is one concrete occurrence of a series.
    pub fn is_occurrence(&self) -> bool {
        self.series_master_id.is_some()
    }

    /// Get the duration of the booking.
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|e| e - self.start)
    }

    /// Check if this booking's time range overlaps another's.
    pub fn overlaps_with(&self, other: &ReservationRecord) -> bool {
        let self_end = self.end.unwrap_or(self.start);
        let other_end = other.end.unwrap_or(other.start);
        self.start < other_end && self_end > other.start
    }

    /// Minimal validity for saving as a draft: a non-empty title.
    pub fn validate_draft(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle.into());
        }
        Ok(())
    }

    /// Full required-field validation before submission.
    pub fn validate_for_submission(&self) -> Result<()> {
        self.validate_draft()?;
        if self.room_id.is_none() {
            return Err(ValidationError::MissingField("room_id".to_string()).into());
        }
        if let Some(end) = self.end {
            if end <= self.start {
                return Err(
                    ValidationError::InvalidTimeRange("end must be after start".to_string()).into(),
                );
            }
        }
        Ok(())
    }
}

// ============================================================================
// Patch (partial update)
// ============================================================================

/// Partial update to a reservation record. Only set fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReservationPatch {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// New start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    /// New end time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// New recurrence definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    /// Drop the recurrence entirely.
    #[serde(default)]
    pub clear_recurrence: bool,
    /// Pattern dates to suppress.
    #[serde(default)]
    pub add_exclusions: Vec<NaiveDate>,
    /// Ad-hoc dates to add.
    #[serde(default)]
    pub add_additions: Vec<NaiveDate>,
    /// External calendar event id to attach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_event_id: Option<String>,
}

impl ReservationPatch {
    /// A patch that only changes the title.
    pub fn retitle(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold a later patch into this one; later edits win field-by-field.
    pub fn merge(&mut self, other: &ReservationPatch) {
        if other.title.is_some() {
            self.title = other.title.clone();
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        if other.room_id.is_some() {
            self.room_id = other.room_id.clone();
        }
        if other.start.is_some() {
            self.start = other.start;
        }
        if other.end.is_some() {
            self.end = other.end;
        }
        if other.clear_recurrence {
            self.clear_recurrence = true;
            self.recurrence = None;
        }
        if let Some(ref recurrence) = other.recurrence {
            self.recurrence = Some(recurrence.clone());
            self.clear_recurrence = false;
        }
        for &date in &other.add_exclusions {
            if !self.add_exclusions.contains(&date) {
                self.add_exclusions.push(date);
            }
        }
        for &date in &other.add_additions {
            if !self.add_additions.contains(&date) {
                self.add_additions.push(date);
            }
        }
        if other.external_event_id.is_some() {
            self.external_event_id = other.external_event_id.clone();
        }
    }

    /// Apply this patch to a record.
    pub fn apply_to(&self, record: &mut ReservationRecord) {
        if let Some(ref title) = self.title {
            record.title = title.clone();
        }
        if let Some(ref description) = self.description {
            record.description = Some(description.clone());
        }
        if let Some(ref room_id) = self.room_id {
            record.room_id = Some(room_id.clone());
        }
        if let Some(start) = self.start {
            record.start = start;
        }
        if let Some(end) = self.end {
            record.end = Some(end);
        }
        if let Some(ref recurrence) = self.recurrence {
            record.recurrence = Some(recurrence.clone());
        }
        if self.clear_recurrence {
            record.recurrence = None;
        }
        if let Some(ref mut recurrence) = record.recurrence {
            for &date in &self.add_exclusions {
                recurrence.add_exclusion(date);
            }
            for &date in &self.add_additions {
                recurrence.add_addition(date);
            }
        }
        if let Some(ref external_id) = self.external_event_id {
            record.external_event_id = Some(external_id.clone());
        }
        record.updated_at = Utc::now();
    }
}

// ============================================================================
// Occurrence Exceptions
// ============================================================================

/// A stored override for one specific occurrence of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OccurrenceException {
    /// The series master this exception belongs to.
    pub series_master_id: String,
    /// The occurrence date this exception overrides.
    pub occurrence_date: NaiveDate,
    /// Whether the occurrence is cancelled outright.
    #[serde(default)]
    pub cancelled: bool,
    /// Overridden fields, merged over the master's fields on expansion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ReservationPatch>,
}

impl OccurrenceException {
    /// A cancelling exception for one occurrence date.
    pub fn cancelled(series_master_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            series_master_id: series_master_id.into(),
            occurrence_date: date,
            cancelled: true,
            overrides: None,
        }
    }

    /// An overriding exception for one occurrence date.
    pub fn overriding(
        series_master_id: impl Into<String>,
        date: NaiveDate,
        overrides: ReservationPatch,
    ) -> Self {
        Self {
            series_master_id: series_master_id.into(),
            occurrence_date: date,
            cancelled: false,
            overrides: Some(overrides),
        }
    }
}

// ============================================================================
// Conflict Reporting
// ============================================================================

/// Why a version-guarded write was rejected. The kinds warrant different user
/// messaging and are classified from the server's current status vs. the
/// status the editor expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Fields changed under the editor; status is as expected.
    ConcurrentEdit,
    /// Another actor moved the record out of the expected status.
    StatusChanged,
    /// The record is already approved/rejected; the action is moot.
    AlreadyActioned,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictKind::ConcurrentEdit => "concurrent edit",
            ConflictKind::StatusChanged => "status changed",
            ConflictKind::AlreadyActioned => "already actioned",
        };
        f.write_str(name)
    }
}

/// Produced by a rejected write: current server state next to the state the
/// editor attempted, for the user to resolve. Never auto-merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConflictReport {
    /// The classified conflict kind.
    pub kind: ConflictKind,
    /// The record as the server currently holds it.
    pub current: ReservationRecord,
    /// The state the editor attempted to write.
    pub attempted: ReservationRecord,
}

// ============================================================================
// Scheduling Conflicts
// ============================================================================

/// A collision between a requested booking and an approved one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SchedulingConflict {
    /// The colliding approved record.
    pub record_id: String,
    /// Title of the colliding record.
    pub title: String,
    /// Room in contention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Start of the overlapping period.
    pub overlap_start: DateTime<Utc>,
    /// End of the overlapping period.
    pub overlap_end: DateTime<Utc>,
    /// Duration of the overlap.
    pub overlap_minutes: i64,
}

impl SchedulingConflict {
    /// Detect a collision between a candidate booking and an existing one.
    /// Only bookings for the same room collide.
    pub fn detect(candidate: &ReservationRecord, existing: &ReservationRecord) -> Option<Self> {
        if candidate.room_id.is_none() || candidate.room_id != existing.room_id {
            return None;
        }
        if !candidate.overlaps_with(existing) {
            return None;
        }

        let candidate_end = candidate.end.unwrap_or(candidate.start);
        let existing_end = existing.end.unwrap_or(existing.start);
        let overlap_start = candidate.start.max(existing.start);
        let overlap_end = candidate_end.min(existing_end);

        Some(Self {
            record_id: existing.id.clone(),
            title: existing.title.clone(),
            room_id: existing.room_id.clone(),
            overlap_start,
            overlap_end,
            overlap_minutes: (overlap_end - overlap_start).num_minutes(),
        })
    }
}
