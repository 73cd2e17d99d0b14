//! Edit session coordinator.
//!
//! One session per record per editor. The session owns a local working copy,
//! the version baseline for guarded writes, the review hold (when one was
//! granted), and the two-phase confirmation state for destructive actions.
//! All collaborator traffic flows through here; the store and lock service
//! are never called directly by user-facing code.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ConflictError, LockError, Result, RotaError, SessionError, StoreError, ValidationError};
use crate::lock::{AcquireOutcome, LockService, ReviewHold};
use crate::record::{
    EditScope, RecordStatus, ReservationPatch, ReservationRecord, SchedulingConflict, VersionToken,
};
use crate::recurrence::engine::expand_series;
use crate::store::{AvailabilityService, CalendarPublisher, RecordStore, WriteAction};

use super::diff::SessionConflict;

/// How many days of occurrences to pre-resolve when opening a series master.
const PREVIEW_WINDOW_DAYS: i64 = 90;

// ============================================================================
// Session State
// ============================================================================

/// Actions that require a second, explicit confirmation before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmableAction {
    Save,
    Approve,
    Reject,
    Delete,
}

impl ConfirmableAction {
    /// Get a human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ConfirmableAction::Save => "save",
            ConfirmableAction::Approve => "approve",
            ConfirmableAction::Reject => "reject",
            ConfirmableAction::Delete => "delete",
        }
    }
}

/// The operation an in-flight commit is executing. Wider than
/// [`ConfirmableAction`]: submit and restore commit without arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Save,
    Submit,
    Approve,
    Reject,
    Delete,
    Restore,
}

impl CommitKind {
    /// Get a human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            CommitKind::Save => "save",
            CommitKind::Submit => "submit",
            CommitKind::Approve => "approve",
            CommitKind::Reject => "reject",
            CommitKind::Delete => "delete",
            CommitKind::Restore => "restore",
        }
    }
}

impl From<ConfirmableAction> for CommitKind {
    fn from(action: ConfirmableAction) -> Self {
        match action {
            ConfirmableAction::Save => CommitKind::Save,
            ConfirmableAction::Approve => CommitKind::Approve,
            ConfirmableAction::Reject => CommitKind::Reject,
            ConfirmableAction::Delete => CommitKind::Delete,
        }
    }
}

/// The session state machine. Commit results arriving after the session has
/// left `Committing` are dropped, not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet opened, or torn down.
    Closed,
    /// Fetching the record and negotiating the review hold.
    Opening,
    /// Editable; mutations accepted.
    Open,
    /// An action is armed and awaiting its confirming invocation.
    Confirming(ConfirmableAction),
    /// A guarded write is in flight.
    Committing(CommitKind),
    /// The last write was rejected on version grounds; the rendered diff is
    /// available and the session no longer accepts writes.
    Conflicted,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Closed => f.write_str("closed"),
            SessionState::Opening => f.write_str("opening"),
            SessionState::Open => f.write_str("open"),
            SessionState::Confirming(a) => write!(f, "confirming {}", a.display_name()),
            SessionState::Committing(k) => write!(f, "committing {}", k.display_name()),
            SessionState::Conflicted => f.write_str("conflicted"),
        }
    }
}

/// Result of invoking a two-phase action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The action is now armed; invoke it again to commit.
    ConfirmationRequired(ConfirmableAction),
    /// The write committed; the returned record carries the new version.
    Committed(ReservationRecord),
}

/// Lease health as reported by [`EditSession::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseStatus {
    /// No hold was granted for this session.
    NoHold,
    /// The lease is healthy.
    Active { minutes_remaining: i64 },
    /// The lease is about to run out; the reviewer should wrap up.
    ExpiringSoon { minutes_remaining: i64 },
    /// The lease ran out; the session has been force-closed.
    Expired,
}

/// Result of closing a session.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// Closed; nothing needed persisting.
    Closed,
    /// An in-progress draft was persisted on the way out.
    DraftSaved(ReservationRecord),
}

// ============================================================================
// Collaborators
// ============================================================================

/// The collaborator handles a session works against.
#[derive(Clone)]
pub struct SessionServices {
    pub store: Arc<dyn RecordStore>,
    pub locks: Arc<dyn LockService>,
    pub availability: Arc<dyn AvailabilityService>,
    pub publisher: Arc<dyn CalendarPublisher>,
}

// ============================================================================
// Edit Session
// ============================================================================

/// A single editing session over one reservation record.
pub struct EditSession {
    services: SessionServices,
    config: Config,
    holder: String,
    state: SessionState,
    /// Local working copy; patches apply here immediately.
    record: ReservationRecord,
    /// Version the next guarded write is conditioned on. Advanced only by a
    /// successful write of our own.
    baseline_version: VersionToken,
    /// Status the editor believes the record is in, for conflict
    /// classification.
    baseline_status: RecordStatus,
    /// Accumulated content edits since the last successful save.
    pending_patch: ReservationPatch,
    dirty: bool,
    /// A composed draft that has never been persisted.
    is_new: bool,
    edit_scope: Option<EditScope>,
    armed_at: Option<DateTime<Utc>>,
    hold: Option<ReviewHold>,
    conflict: Option<SessionConflict>,
    /// Occurrences materialized at open for series display.
    preview: Vec<ReservationRecord>,
    /// Availability warnings surfaced at open. Advisory only.
    warnings: Vec<SchedulingConflict>,
}

impl EditSession {
    /// Open a session on an existing record.
    ///
    /// Pending records take the review hold; a refusal aborts the open with
    /// [`LockError::Held`]. A lock service transport failure does NOT abort:
    /// the session opens unlocked and correctness falls back to the version
    /// guard.
    pub async fn open(
        services: SessionServices,
        config: Config,
        record_id: &str,
        holder: impl Into<String>,
    ) -> Result<Self> {
        let holder = holder.into();
        debug!("Opening edit session on {} for {}", record_id, holder);

        let record = services
            .store
            .get(record_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(record_id.to_string()))?;

        let mut session = Self {
            services,
            config,
            holder,
            state: SessionState::Opening,
            baseline_version: record.version.clone(),
            baseline_status: record.status,
            record,
            pending_patch: ReservationPatch::default(),
            dirty: false,
            is_new: false,
            edit_scope: None,
            armed_at: None,
            hold: None,
            conflict: None,
            preview: Vec::new(),
            warnings: Vec::new(),
        };

        if session.record.status == RecordStatus::Pending {
            match session
                .services
                .locks
                .acquire(record_id, &session.holder)
                .await
            {
                Ok(AcquireOutcome::Acquired(hold)) => session.hold = Some(hold),
                Ok(AcquireOutcome::Refused { holder, expires_at }) => {
                    return Err(LockError::Held { holder, expires_at }.into());
                }
                Err(e) => {
                    warn!(
                        "Lock service unreachable for {}; opening unlocked: {}",
                        record_id, e
                    );
                }
            }
        }

        session.resolve_preview().await;
        session.resolve_warnings().await;
        session.state = SessionState::Open;
        info!(
            "Session open on {} ({}) for {}",
            session.record.id, session.record.status, session.holder
        );
        Ok(session)
    }

    /// Start a session around a brand-new, not-yet-persisted draft. No hold
    /// is taken; the record does not exist anywhere else yet.
    pub fn compose(
        services: SessionServices,
        config: Config,
        record: ReservationRecord,
        holder: impl Into<String>,
    ) -> Self {
        Self {
            services,
            config,
            holder: holder.into(),
            state: SessionState::Open,
            baseline_version: record.version.clone(),
            baseline_status: record.status,
            record,
            pending_patch: ReservationPatch::default(),
            dirty: false,
            is_new: true,
            edit_scope: None,
            armed_at: None,
            hold: None,
            conflict: None,
            preview: Vec::new(),
            warnings: Vec::new(),
        }
    }

    async fn resolve_preview(&mut self) {
        if !self.record.is_series_master() {
            return;
        }
        let window_start = self.record.start.date_naive();
        let window_end = window_start + Duration::days(PREVIEW_WINDOW_DAYS);
        match self
            .services
            .store
            .list_exceptions(&self.record.id, window_start, window_end)
            .await
        {
            Ok(exceptions) => {
                self.preview = expand_series(&self.record, window_start, window_end, &exceptions);
                self.preview.truncate(self.config.recurrence.max_occurrences);
            }
            Err(e) => warn!("Could not pre-resolve occurrences for {}: {}", self.record.id, e),
        }
    }

    async fn resolve_warnings(&mut self) {
        match self
            .services
            .availability
            .check_window(&self.record, self.config.session.availability_buffer_minutes)
            .await
        {
            Ok(conflicts) => self.warnings = conflicts,
            Err(e) => warn!("Availability pre-check failed for {}: {}", self.record.id, e),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Current state of the session state machine.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The local working copy.
    pub fn record(&self) -> &ReservationRecord {
        &self.record
    }

    /// Whether unsaved edits exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the session holds a composed draft that was never persisted.
    pub fn has_unsaved_draft(&self) -> bool {
        self.is_new && self.dirty
    }

    /// The review hold, when one was granted.
    pub fn hold(&self) -> Option<&ReviewHold> {
        self.hold.as_ref()
    }

    /// The rendered conflict after a rejected write.
    pub fn conflict(&self) -> Option<&SessionConflict> {
        self.conflict.as_ref()
    }

    /// Occurrences pre-resolved at open for series display.
    pub fn occurrence_preview(&self) -> &[ReservationRecord] {
        &self.preview
    }

    /// Availability warnings surfaced at open.
    pub fn availability_warnings(&self) -> &[SchedulingConflict] {
        &self.warnings
    }

    /// The chosen edit scope, if any.
    pub fn scope(&self) -> Option<EditScope> {
        self.edit_scope
    }

    /// Choose which part of a recurring series subsequent writes target.
    pub fn set_scope(&mut self, scope: EditScope) {
        self.edit_scope = Some(scope);
    }

    // ------------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------------

    /// Apply an edit to the working copy. Legal while open; an armed
    /// confirmation is cancelled, since it no longer describes what would be
    /// written.
    pub fn update(&mut self, patch: ReservationPatch) -> Result<()> {
        match self.state {
            SessionState::Open => {}
            SessionState::Confirming(action) => {
                debug!("Edit cancels armed {} confirmation", action.display_name());
                self.disarm();
            }
            other => return Err(SessionError::NotOpen(other.to_string()).into()),
        }
        patch.apply_to(&mut self.record);
        self.pending_patch.merge(&patch);
        self.dirty = true;
        Ok(())
    }

    /// Cancel an armed confirmation without committing.
    pub fn cancel_confirmation(&mut self) {
        if matches!(self.state, SessionState::Confirming(_)) {
            self.disarm();
        }
    }

    // ------------------------------------------------------------------------
    // Two-phase plumbing
    // ------------------------------------------------------------------------

    fn arm(&mut self, action: ConfirmableAction) -> ActionOutcome {
        debug!("Arming {} on {}", action.display_name(), self.record.id);
        self.state = SessionState::Confirming(action);
        self.armed_at = Some(Utc::now());
        ActionOutcome::ConfirmationRequired(action)
    }

    fn disarm(&mut self) {
        self.state = SessionState::Open;
        self.armed_at = None;
    }

    fn confirmation_expired(&self, now: DateTime<Utc>) -> bool {
        self.armed_at.map_or(true, |armed| {
            now - armed > Duration::seconds(self.config.session.confirmation_timeout_secs)
        })
    }

    /// Whether this invocation is the confirming (second) one for `action`.
    /// A different armed action, or a stale arm, is cancelled and the caller
    /// arms afresh.
    fn take_confirmation(&mut self, action: ConfirmableAction) -> Result<bool> {
        match self.state {
            SessionState::Open => Ok(false),
            SessionState::Confirming(armed) => {
                if armed == action && !self.confirmation_expired(Utc::now()) {
                    self.armed_at = None;
                    Ok(true)
                } else {
                    if armed != action {
                        debug!(
                            "Armed {} superseded by {}",
                            armed.display_name(),
                            action.display_name()
                        );
                    } else {
                        debug!("Armed {} went stale; re-arming", armed.display_name());
                    }
                    self.disarm();
                    Ok(false)
                }
            }
            other => Err(SessionError::NotOpen(other.to_string()).into()),
        }
    }

    /// Scope to send with a content write. Only series masters carry one.
    fn write_scope(&self) -> Option<EditScope> {
        if self.record.is_series_master() {
            self.edit_scope
        } else {
            None
        }
    }

    /// Adopt a record returned by a successful write as the new baseline.
    fn adopt(&mut self, record: ReservationRecord) {
        self.baseline_version = record.version.clone();
        self.baseline_status = record.status;
        self.record = record;
        self.pending_patch = ReservationPatch::default();
        self.dirty = false;
    }

    /// Route a failed commit. Version conflicts park the session in
    /// `Conflicted` with a rendered diff; everything else returns it to
    /// `Open` with the edits intact so the user can retry.
    fn fail_commit(&mut self, err: RotaError) -> RotaError {
        self.armed_at = None;
        match err {
            RotaError::Conflict(ConflictError::Version(report)) => {
                warn!(
                    "Version conflict ({}) on {}",
                    report.kind, self.record.id
                );
                self.conflict = Some(SessionConflict::render((*report).clone(), &self.record));
                self.state = SessionState::Conflicted;
                ConflictError::Version(report).into()
            }
            other => {
                self.state = SessionState::Open;
                other
            }
        }
    }

    /// Results landing after teardown are dropped, never applied.
    fn ensure_still_committing(&self) -> Result<()> {
        if matches!(self.state, SessionState::Committing(_)) {
            Ok(())
        } else {
            debug!("Dropping commit result for torn-down session {}", self.record.id);
            Err(SessionError::Closed.into())
        }
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    /// Save the accumulated edits. Two-phase: the first call arms, the
    /// second commits.
    pub async fn save(&mut self) -> Result<ActionOutcome> {
        // Local validation resolves before any collaborator is contacted.
        self.record.validate_draft()?;
        if self.record.is_series_master() && !self.is_new && self.edit_scope.is_none() {
            return Err(ValidationError::ScopeRequired.into());
        }
        if !self.take_confirmation(ConfirmableAction::Save)? {
            return Ok(self.arm(ConfirmableAction::Save));
        }

        self.state = SessionState::Committing(CommitKind::Save);
        let result = if self.is_new {
            self.services.store.create(self.record.clone()).await
        } else {
            self.services
                .store
                .write(
                    &self.record.id,
                    &self.baseline_version,
                    self.baseline_status,
                    self.pending_patch.clone(),
                    WriteAction::Save {
                        scope: self.write_scope(),
                    },
                )
                .await
        };
        self.ensure_still_committing()?;

        match result {
            Ok(saved) => {
                info!("Saved {} at version {}", saved.id, saved.version);
                self.is_new = false;
                self.adopt(saved.clone());
                self.state = SessionState::Open;
                Ok(ActionOutcome::Committed(saved))
            }
            Err(e) => Err(self.fail_commit(e)),
        }
    }

    /// Submit a draft for review. Single-phase; full required-field
    /// validation runs locally first. An unsaved draft is persisted as part
    /// of the submission.
    pub async fn submit(&mut self) -> Result<ReservationRecord> {
        if self.state != SessionState::Open {
            return Err(SessionError::NotOpen(self.state.to_string()).into());
        }
        self.record.validate_for_submission()?;

        self.state = SessionState::Committing(CommitKind::Submit);
        if self.is_new {
            let created = self.services.store.create(self.record.clone()).await;
            self.ensure_still_committing()?;
            match created {
                Ok(saved) => {
                    self.is_new = false;
                    self.adopt(saved);
                }
                Err(e) => return Err(self.fail_commit(e)),
            }
        } else if self.dirty {
            let saved = self.write_content(WriteAction::Save { scope: self.write_scope() }).await;
            self.ensure_still_committing()?;
            match saved {
                Ok(saved) => self.adopt(saved),
                Err(e) => return Err(self.fail_commit(e)),
            }
        }

        let submitted = self.write_content(WriteAction::Submit).await;
        self.ensure_still_committing()?;
        match submitted {
            Ok(record) => {
                info!("Submitted {} for review", record.id);
                self.adopt(record.clone());
                self.state = SessionState::Open;
                Ok(record)
            }
            Err(e) => Err(self.fail_commit(e)),
        }
    }

    async fn write_content(&self, action: WriteAction) -> Result<ReservationRecord> {
        self.services
            .store
            .write(
                &self.record.id,
                &self.baseline_version,
                self.baseline_status,
                self.pending_patch.clone(),
                action,
            )
            .await
    }

    /// Approve the record. Two-phase. Unsaved edits are saved first and the
    /// approval is conditioned on the version returned by that save.
    pub async fn approve(&mut self) -> Result<ActionOutcome> {
        self.approve_inner(false).await
    }

    /// Approve despite scheduling conflicts. Refused unless enabled in
    /// configuration.
    pub async fn force_approve(&mut self) -> Result<ActionOutcome> {
        if !self.config.session.allow_force_approve {
            return Err(SessionError::ForceApproveDisabled.into());
        }
        self.approve_inner(true).await
    }

    async fn approve_inner(&mut self, force: bool) -> Result<ActionOutcome> {
        if self.is_new {
            return Err(StoreError::InvalidOperation(
                "cannot approve a record that was never submitted".to_string(),
            )
            .into());
        }
        self.record.validate_for_submission()?;
        if self.dirty && self.record.is_series_master() && self.edit_scope.is_none() {
            return Err(ValidationError::ScopeRequired.into());
        }
        if !self.take_confirmation(ConfirmableAction::Approve)? {
            return Ok(self.arm(ConfirmableAction::Approve));
        }

        self.state = SessionState::Committing(CommitKind::Approve);

        // Pre-emptive availability check. The approve write re-checks
        // authoritatively; a failure here degrades to that re-check alone.
        if !force {
            match self
                .services
                .availability
                .check_window(&self.record, self.config.session.availability_buffer_minutes)
                .await
            {
                Ok(conflicts) if !conflicts.is_empty() => {
                    self.state = SessionState::Open;
                    return Err(ConflictError::Scheduling(conflicts).into());
                }
                Ok(_) => {}
                Err(e) => warn!(
                    "Availability pre-check unavailable; deferring to the store: {}",
                    e
                ),
            }
            self.ensure_still_committing()?;
        }

        // Save-then-approve, strictly ordered. The approve is conditioned on
        // the version the save returned, never on the stale baseline.
        if self.dirty {
            let saved = self
                .write_content(WriteAction::Save {
                    scope: self.write_scope(),
                })
                .await;
            self.ensure_still_committing()?;
            match saved {
                Ok(saved) => self.adopt(saved),
                Err(e) => return Err(self.fail_commit(e)),
            }
        }

        let approved = self.write_content(WriteAction::Approve { force }).await;
        self.ensure_still_committing()?;
        let approved = match approved {
            Ok(record) => record,
            Err(e) => return Err(self.fail_commit(e)),
        };
        self.adopt(approved.clone());

        // Publish exactly once, after content is durable.
        let published = self.services.publisher.publish(&approved).await;
        self.ensure_still_committing()?;
        match published {
            Ok(external_id) => {
                let patch = ReservationPatch {
                    external_event_id: Some(external_id),
                    ..Default::default()
                };
                let scope = if approved.is_series_master() {
                    Some(EditScope::AllOccurrences)
                } else {
                    None
                };
                match self
                    .services
                    .store
                    .write(
                        &approved.id,
                        &self.baseline_version,
                        self.baseline_status,
                        patch,
                        WriteAction::Save { scope },
                    )
                    .await
                {
                    Ok(linked) => self.adopt(linked),
                    Err(e) => warn!(
                        "Approved {} but could not attach external event id: {}",
                        approved.id, e
                    ),
                }
            }
            Err(e) => {
                // The approval itself stands; publication can be retried.
                warn!("Calendar publication failed for {}: {}", approved.id, e);
                self.state = SessionState::Open;
                return Err(e);
            }
        }

        info!("Approved {}", self.record.id);
        self.state = SessionState::Open;
        Ok(ActionOutcome::Committed(self.record.clone()))
    }

    /// Reject the record with a mandatory reason. Two-phase.
    pub async fn reject(&mut self, reason: impl Into<String>) -> Result<ActionOutcome> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(ValidationError::MissingRejectionReason.into());
        }
        if !self.take_confirmation(ConfirmableAction::Reject)? {
            return Ok(self.arm(ConfirmableAction::Reject));
        }

        self.state = SessionState::Committing(CommitKind::Reject);
        let rejected = self
            .write_content(WriteAction::Reject { reason })
            .await;
        self.ensure_still_committing()?;
        match rejected {
            Ok(record) => {
                info!("Rejected {}", record.id);
                self.adopt(record.clone());
                self.state = SessionState::Open;
                Ok(ActionOutcome::Committed(record))
            }
            Err(e) => Err(self.fail_commit(e)),
        }
    }

    /// Soft-delete the record, or cancel a single occurrence when the scope
    /// says so. Two-phase.
    pub async fn delete(&mut self) -> Result<ActionOutcome> {
        if self.is_new {
            return Err(StoreError::InvalidOperation(
                "cannot delete a record that was never persisted".to_string(),
            )
            .into());
        }
        if !self.take_confirmation(ConfirmableAction::Delete)? {
            return Ok(self.arm(ConfirmableAction::Delete));
        }

        self.state = SessionState::Committing(CommitKind::Delete);
        // Only a this-occurrence scope narrows a delete; everything else
        // deletes the whole record.
        let scope = match self.edit_scope {
            Some(EditScope::ThisOccurrence { date }) if self.record.is_series_master() => {
                Some(EditScope::ThisOccurrence { date })
            }
            _ => None,
        };
        let deleted = self
            .services
            .store
            .write(
                &self.record.id,
                &self.baseline_version,
                self.baseline_status,
                ReservationPatch::default(),
                WriteAction::Delete { scope },
            )
            .await;
        self.ensure_still_committing()?;
        match deleted {
            Ok(record) => {
                info!("Deleted {} ({:?} scope)", record.id, scope);
                self.adopt(record.clone());
                self.state = SessionState::Open;
                Ok(ActionOutcome::Committed(record))
            }
            Err(e) => Err(self.fail_commit(e)),
        }
    }

    /// Restore a soft-deleted record to its remembered prior status.
    pub async fn restore(&mut self) -> Result<ReservationRecord> {
        if self.state != SessionState::Open {
            return Err(SessionError::NotOpen(self.state.to_string()).into());
        }
        self.state = SessionState::Committing(CommitKind::Restore);
        let restored = self.write_content(WriteAction::Restore).await;
        self.ensure_still_committing()?;
        match restored {
            Ok(record) => {
                info!("Restored {} to {}", record.id, record.status);
                self.adopt(record.clone());
                self.state = SessionState::Open;
                Ok(record)
            }
            Err(e) => Err(self.fail_commit(e)),
        }
    }

    // ------------------------------------------------------------------------
    // Housekeeping
    // ------------------------------------------------------------------------

    /// Periodic housekeeping. Expires stale armed confirmations, reports
    /// lease health, and force-closes the session when the lease ran out.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> LeaseStatus {
        if matches!(self.state, SessionState::Confirming(_)) && self.confirmation_expired(now) {
            debug!("Armed confirmation expired on {}", self.record.id);
            self.disarm();
        }

        let Some(hold) = self.hold.clone() else {
            return LeaseStatus::NoHold;
        };
        if hold.is_expired(now) {
            warn!(
                "Review hold on {} expired; force-closing session",
                self.record.id
            );
            self.release_hold().await;
            self.state = SessionState::Closed;
            return LeaseStatus::Expired;
        }

        let minutes_remaining = hold.minutes_remaining(now);
        if minutes_remaining <= self.config.lock.warn_minutes {
            LeaseStatus::ExpiringSoon { minutes_remaining }
        } else {
            LeaseStatus::Active { minutes_remaining }
        }
    }

    /// Close the session. A composed draft with unsaved content is persisted
    /// when `persist_draft` is set; otherwise edits are discarded. The hold
    /// release is best-effort and never blocks the close.
    pub async fn close(&mut self, persist_draft: bool) -> Result<CloseOutcome> {
        if self.state == SessionState::Closed {
            return Ok(CloseOutcome::Closed);
        }

        let mut outcome = CloseOutcome::Closed;
        if persist_draft && self.has_unsaved_draft() {
            self.record.validate_draft()?;
            let saved = self.services.store.create(self.record.clone()).await?;
            info!("Persisted in-progress draft {} on close", saved.id);
            self.is_new = false;
            outcome = CloseOutcome::DraftSaved(saved);
        }

        self.release_hold().await;
        self.state = SessionState::Closed;
        self.conflict = None;
        self.armed_at = None;
        Ok(outcome)
    }

    async fn release_hold(&mut self) {
        if let Some(hold) = self.hold.take() {
            if let Err(e) = self.services.locks.release(&hold.record_id).await {
                warn!("Could not release review hold on {}: {}", hold.record_id, e);
            }
        }
    }
}
