//! In-memory reference implementations of the collaborator traits.
//!
//! `InMemoryRecordStore` holds the whole map behind one write lock for the
//! duration of a guarded write, which gives the atomic compare-and-swap the
//! contract requires.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ConflictError, Result, StoreError, ValidationError};
use crate::record::{
    next_status, ConflictKind, ConflictReport, EditScope, LifecycleAction, OccurrenceException,
    RecordStatus, ReservationPatch, ReservationRecord, SchedulingConflict, VersionToken,
};

use super::traits::{AvailabilityService, CalendarPublisher, RecordStore, WriteAction};

/// Classify a version mismatch from the server's current status vs. the
/// status the editor expected.
fn classify_conflict(current: RecordStatus, expected: RecordStatus) -> ConflictKind {
    if current == expected {
        ConflictKind::ConcurrentEdit
    } else if current.is_actioned() && expected == RecordStatus::Pending {
        ConflictKind::AlreadyActioned
    } else {
        ConflictKind::StatusChanged
    }
}

/// In-memory record store with compare-and-swap writes.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, ReservationRecord>>,
    exceptions: RwLock<HashMap<String, Vec<OccurrenceException>>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing validation. Test/setup convenience.
    pub async fn seed(&self, record: ReservationRecord) {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record);
    }

    /// Store or replace an exception for one occurrence date.
    async fn upsert_exception(&self, exception: OccurrenceException) {
        let mut map = self.exceptions.write().await;
        let list = map
            .entry(exception.series_master_id.clone())
            .or_insert_with(Vec::new);
        list.retain(|e| e.occurrence_date != exception.occurrence_date);
        list.push(exception);
        list.sort_by_key(|e| e.occurrence_date);
    }

    /// Scheduling conflicts between a candidate and every approved booking.
    fn conflicts_against(
        records: &HashMap<String, ReservationRecord>,
        candidate: &ReservationRecord,
    ) -> Vec<SchedulingConflict> {
        let mut conflicts: Vec<SchedulingConflict> = records
            .values()
            .filter(|r| r.id != candidate.id && r.status == RecordStatus::Approved)
            .filter_map(|r| SchedulingConflict::detect(candidate, r))
            .collect();
        conflicts.sort_by(|a, b| b.overlap_minutes.cmp(&a.overlap_minutes));
        conflicts
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, id: &str) -> Result<Option<ReservationRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn create(&self, record: ReservationRecord) -> Result<ReservationRecord> {
        record.validate_draft()?;
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::InvalidOperation(format!(
                "record {} already exists",
                record.id
            ))
            .into());
        }
        debug!("Created record: {} ({})", record.title, record.id);
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn write(
        &self,
        id: &str,
        expected_version: &VersionToken,
        expected_status: RecordStatus,
        patch: ReservationPatch,
        action: WriteAction,
    ) -> Result<ReservationRecord> {
        let mut records = self.records.write().await;
        let current = records
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .clone();

        // Compare-and-swap guard: reject and apply nothing on a stale token.
        if current.version != *expected_version {
            let kind = classify_conflict(current.status, expected_status);
            let mut attempted = current.clone();
            patch.apply_to(&mut attempted);
            attempted.status = expected_status;
            debug!("Rejected stale write on {} ({})", id, kind);
            return Err(ConflictError::Version(Box::new(ConflictReport {
                kind,
                current,
                attempted,
            }))
            .into());
        }

        let mut next = current.clone();
        let mut exception_to_store: Option<OccurrenceException> = None;

        match &action {
            WriteAction::Save { scope } => {
                if next.recurrence.is_some() {
                    match scope {
                        Some(EditScope::ThisOccurrence { date }) => {
                            exception_to_store = Some(OccurrenceException::overriding(
                                next.id.clone(),
                                *date,
                                patch.clone(),
                            ));
                        }
                        Some(EditScope::AllOccurrences) => patch.apply_to(&mut next),
                        None => return Err(ValidationError::ScopeRequired.into()),
                    }
                } else {
                    patch.apply_to(&mut next);
                }
                next.validate_draft()?;
            }
            WriteAction::Submit => {
                patch.apply_to(&mut next);
                next.validate_for_submission()?;
                next.status = next_status(current.status, None, LifecycleAction::Submit)?;
            }
            WriteAction::Approve { force } => {
                next.status = next_status(current.status, None, LifecycleAction::Approve)?;
                // Authoritative re-check, independent of the pre-emptive one.
                if !force {
                    let conflicts = Self::conflicts_against(&records, &next);
                    if !conflicts.is_empty() {
                        return Err(ConflictError::Scheduling(conflicts).into());
                    }
                }
            }
            WriteAction::Reject { reason } => {
                if reason.trim().is_empty() {
                    return Err(ValidationError::MissingRejectionReason.into());
                }
                next.status = next_status(current.status, None, LifecycleAction::Reject)?;
                next.rejection_reason = Some(reason.clone());
            }
            WriteAction::Delete { scope } => {
                if let Some(EditScope::ThisOccurrence { date }) = scope {
                    if next.recurrence.is_some() {
                        exception_to_store =
                            Some(OccurrenceException::cancelled(next.id.clone(), *date));
                    } else {
                        return Err(StoreError::InvalidOperation(
                            "this-occurrence delete on a non-recurring record".to_string(),
                        )
                        .into());
                    }
                } else {
                    next.previous_status = Some(current.status);
                    next.status = next_status(current.status, None, LifecycleAction::Delete)?;
                }
            }
            WriteAction::Restore => {
                next.status =
                    next_status(current.status, current.previous_status, LifecycleAction::Restore)?;
                next.previous_status = None;
            }
        }

        next.version = VersionToken::fresh();
        next.updated_at = Utc::now();
        records.insert(next.id.clone(), next.clone());
        drop(records);

        if let Some(exception) = exception_to_store {
            self.upsert_exception(exception).await;
        }

        debug!(
            "Applied {} on {} -> {} ({})",
            action.display_name(),
            id,
            next.status,
            next.version
        );
        Ok(next)
    }

    async fn list_exceptions(
        &self,
        series_master_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<OccurrenceException>> {
        let map = self.exceptions.read().await;
        Ok(map
            .get(series_master_id)
            .map(|list| {
                list.iter()
                    .filter(|e| {
                        e.occurrence_date >= window_start && e.occurrence_date <= window_end
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl AvailabilityService for InMemoryRecordStore {
    async fn check_window(
        &self,
        candidate: &ReservationRecord,
        buffer_minutes: i64,
    ) -> Result<Vec<SchedulingConflict>> {
        let buffer = Duration::minutes(buffer_minutes);
        let mut buffered = candidate.clone();
        buffered.start = candidate.start - buffer;
        buffered.end = Some(candidate.end.unwrap_or(candidate.start) + buffer);

        let records = self.records.read().await;
        Ok(Self::conflicts_against(&records, &buffered))
    }
}

/// A publisher that records what it published; the in-memory stand-in for
/// the external calendar integration.
#[derive(Default)]
pub struct RecordingPublisher {
    published: RwLock<Vec<(String, String)>>,
}

impl RecordingPublisher {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, as sessions take `Arc<dyn CalendarPublisher>`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// (record id, external event id) pairs published so far.
    pub async fn published(&self) -> Vec<(String, String)> {
        self.published.read().await.clone()
    }
}

#[async_trait]
impl CalendarPublisher for RecordingPublisher {
    async fn publish(&self, record: &ReservationRecord) -> Result<String> {
        let external_id = format!("cal-evt-{}", uuid::Uuid::new_v4());
        info!("Published {} as {}", record.id, external_id);
        self.published
            .write()
            .await
            .push((record.id.clone(), external_id.clone()));
        Ok(external_id)
    }
}
