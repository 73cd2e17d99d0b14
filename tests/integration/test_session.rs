//! End-to-end session flows: locking, conflicts, approvals, and series
//! edits running through the coordinator against the in-memory services.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use rota::{
    AcquireOutcome, ActionOutcome, Config, ConfirmableAction, EditScope, EditSession,
    InMemoryLockService, InMemoryRecordStore, LockService, Recurrence, RecurrencePattern,
    RecurrenceRange, RecordStore, RecordingPublisher, RecordStatus, ReservationPatch,
    ReservationRecord, Result, RotaError, SessionServices, SessionState, StoreError,
};

fn build_services(store: Arc<InMemoryRecordStore>) -> (SessionServices, Arc<RecordingPublisher>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let publisher = RecordingPublisher::shared();
    let services = SessionServices {
        store: store.clone(),
        locks: Arc::new(InMemoryLockService::default()),
        availability: store,
        publisher: publisher.clone(),
    };
    (services, publisher)
}

fn pending_record(id: &str, title: &str) -> ReservationRecord {
    ReservationRecord::with_id(id, title, Utc::now())
        .with_room("room-a")
        .with_requester("dana")
        .with_duration(Duration::hours(1))
        .with_status(RecordStatus::Pending)
}

/// A lock service that is down. Acquisition must not block session open.
struct DownLockService;

#[async_trait]
impl LockService for DownLockService {
    async fn acquire(&self, _record_id: &str, _holder: &str) -> Result<AcquireOutcome> {
        Err(StoreError::Transport("lock service offline".to_string()).into())
    }

    async fn release(&self, _record_id: &str) -> Result<()> {
        Err(StoreError::Transport("lock service offline".to_string()).into())
    }
}

#[tokio::test]
async fn test_second_reviewer_is_refused() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.seed(pending_record("rec-1", "Quarterly review")).await;
    let (services, _) = build_services(store);

    let _first = EditSession::open(services.clone(), Config::default(), "rec-1", "alice")
        .await
        .unwrap();

    let err = match EditSession::open(services, Config::default(), "rec-1", "bob").await {
        Ok(_) => panic!("second reviewer should be refused"),
        Err(err) => err,
    };
    match err {
        RotaError::Lock(rota::LockError::Held { holder, .. }) => assert_eq!(holder, "alice"),
        other => panic!("expected lock refusal, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hold_released_on_close_admits_next_reviewer() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.seed(pending_record("rec-1", "Quarterly review")).await;
    let (services, _) = build_services(store);

    let mut first = EditSession::open(services.clone(), Config::default(), "rec-1", "alice")
        .await
        .unwrap();
    first.close(false).await.unwrap();

    let second = EditSession::open(services, Config::default(), "rec-1", "bob").await;
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_lock_service_outage_fails_open() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.seed(pending_record("rec-1", "Quarterly review")).await;
    let publisher = RecordingPublisher::shared();
    let services = SessionServices {
        store: store.clone(),
        locks: Arc::new(DownLockService),
        availability: store,
        publisher,
    };

    // Sessions open unlocked; the version guard still protects writes.
    let mut session = EditSession::open(services.clone(), Config::default(), "rec-1", "alice")
        .await
        .unwrap();
    assert!(session.hold().is_none());
    assert_eq!(session.state(), SessionState::Open);

    // With no lock to refuse them, a second reviewer gets in too.
    let other = EditSession::open(services, Config::default(), "rec-1", "bob")
        .await
        .unwrap();
    assert!(other.hold().is_none());

    session.update(ReservationPatch::retitle("Edited unlocked")).unwrap();
    session.save().await.unwrap();
    let saved = session.save().await.unwrap();
    assert!(matches!(saved, ActionOutcome::Committed(_)));

    // Close must swallow the release failure.
    session.close(false).await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_stale_write_renders_field_diff() {
    let store = Arc::new(InMemoryRecordStore::new());
    let draft = ReservationRecord::with_id("rec-1", "Server title", Utc::now())
        .with_room("room-a")
        .with_duration(Duration::hours(1));
    store.seed(draft).await;
    let (services, _) = build_services(store);

    // Drafts take no hold, so two sessions can open concurrently.
    let mut alice = EditSession::open(services.clone(), Config::default(), "rec-1", "alice")
        .await
        .unwrap();
    let mut bob = EditSession::open(services, Config::default(), "rec-1", "bob")
        .await
        .unwrap();

    alice.update(ReservationPatch::retitle("From alice")).unwrap();
    alice.save().await.unwrap();
    alice.save().await.unwrap();

    bob.update(ReservationPatch::retitle("From bob")).unwrap();
    bob.save().await.unwrap();
    let err = bob.save().await.unwrap_err();
    assert!(matches!(
        err,
        RotaError::Conflict(rota::ConflictError::Version(_))
    ));
    assert_eq!(bob.state(), SessionState::Conflicted);

    let conflict = bob.conflict().expect("conflict should be rendered");
    let title = conflict
        .changes
        .iter()
        .find(|c| c.field == "title")
        .expect("title should differ");
    assert_eq!(title.current, "From alice");
    assert_eq!(title.attempted, "From bob");

    // A conflicted session refuses further edits.
    let err = bob.update(ReservationPatch::retitle("More")).unwrap_err();
    assert!(matches!(err, RotaError::Session(_)));
}

#[tokio::test]
async fn test_save_then_approve_uses_fresh_version() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.seed(pending_record("rec-1", "Initial title")).await;
    let (services, publisher) = build_services(store.clone());

    let mut session = EditSession::open(services, Config::default(), "rec-1", "alice")
        .await
        .unwrap();
    session.update(ReservationPatch::retitle("Final title")).unwrap();

    session.approve().await.unwrap();
    let outcome = session.approve().await.unwrap();
    let record = match outcome {
        ActionOutcome::Committed(record) => record,
        other => panic!("expected commit, got {other:?}"),
    };

    // Content saved, then approved, then linked to the published event.
    assert_eq!(record.title, "Final title");
    assert_eq!(record.status, RecordStatus::Approved);
    assert!(record.external_event_id.is_some());
    assert_eq!(publisher.published().await.len(), 1);

    let server = store.get("rec-1").await.unwrap().unwrap();
    assert_eq!(server.title, "Final title");
    assert_eq!(server.status, RecordStatus::Approved);
}

#[tokio::test]
async fn test_approve_blocked_by_double_booking_until_forced() {
    let store = Arc::new(InMemoryRecordStore::new());
    let start = Utc::now();
    store
        .seed(
            ReservationRecord::with_id("existing", "Existing booking", start)
                .with_room("room-a")
                .with_duration(Duration::hours(1))
                .with_status(RecordStatus::Approved),
        )
        .await;
    store
        .seed(
            ReservationRecord::with_id("rec-1", "New request", start + Duration::minutes(30))
                .with_room("room-a")
                .with_duration(Duration::hours(1))
                .with_status(RecordStatus::Pending),
        )
        .await;
    let (services, publisher) = build_services(store);

    let mut config = Config::default();
    config.session.allow_force_approve = true;

    let mut session = EditSession::open(services, config, "rec-1", "alice")
        .await
        .unwrap();
    assert_eq!(session.availability_warnings().len(), 1);

    session.approve().await.unwrap();
    let err = session.approve().await.unwrap_err();
    assert!(matches!(
        err,
        RotaError::Conflict(rota::ConflictError::Scheduling(_))
    ));
    assert_eq!(session.state(), SessionState::Open);

    session.force_approve().await.unwrap();
    let outcome = session.force_approve().await.unwrap();
    match outcome {
        ActionOutcome::Committed(record) => assert_eq!(record.status, RecordStatus::Approved),
        other => panic!("expected commit, got {other:?}"),
    }
    assert_eq!(publisher.published().await.len(), 1);
}

#[tokio::test]
async fn test_delete_single_occurrence_leaves_series_intact() {
    let store = Arc::new(InMemoryRecordStore::new());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let pattern = RecurrencePattern::weekly_on(1, [chrono::Weekday::Mon]).unwrap();
    let range = RecurrenceRange::starting(start.date_naive());
    let master = ReservationRecord::with_id("series-1", "Weekly sync", start)
        .with_room("room-a")
        .with_duration(Duration::hours(1))
        .with_recurrence(Recurrence::new(pattern, range));
    store.seed(master).await;
    let (services, _) = build_services(store.clone());

    let mut session = EditSession::open(services.clone(), Config::default(), "series-1", "alice")
        .await
        .unwrap();
    session.set_scope(EditScope::ThisOccurrence {
        date: start.date_naive() + Duration::days(14),
    });

    let armed = session.delete().await.unwrap();
    assert_eq!(
        armed,
        ActionOutcome::ConfirmationRequired(ConfirmableAction::Delete)
    );
    let outcome = session.delete().await.unwrap();
    match outcome {
        // The master survives; only the one occurrence is cancelled.
        ActionOutcome::Committed(record) => assert_eq!(record.status, RecordStatus::Draft),
        other => panic!("expected commit, got {other:?}"),
    }

    // A fresh session's occurrence preview omits the cancelled date.
    let reopened = EditSession::open(services, Config::default(), "series-1", "bob")
        .await
        .unwrap();
    let dates: Vec<_> = reopened
        .occurrence_preview()
        .iter()
        .filter_map(|o| o.occurrence_date)
        .collect();
    assert!(dates.contains(&start.date_naive()));
    assert!(!dates.contains(&(start.date_naive() + Duration::days(14))));
}

#[tokio::test]
async fn test_whole_series_delete_and_restore() {
    let store = Arc::new(InMemoryRecordStore::new());
    store
        .seed(pending_record("rec-1", "Doomed booking"))
        .await;
    let (services, _) = build_services(store);

    let mut session = EditSession::open(services, Config::default(), "rec-1", "alice")
        .await
        .unwrap();
    session.delete().await.unwrap();
    let outcome = session.delete().await.unwrap();
    match outcome {
        ActionOutcome::Committed(record) => {
            assert_eq!(record.status, RecordStatus::Deleted);
            assert_eq!(record.previous_status, Some(RecordStatus::Pending));
        }
        other => panic!("expected commit, got {other:?}"),
    }

    let restored = session.restore().await.unwrap();
    assert_eq!(restored.status, RecordStatus::Pending);
}

#[tokio::test]
async fn test_compose_submit_flow() {
    let store = Arc::new(InMemoryRecordStore::new());
    let (services, _) = build_services(store.clone());

    let draft = ReservationRecord::new("Planning workshop", Utc::now())
        .with_room("room-b")
        .with_requester("dana")
        .with_duration(Duration::hours(2));
    let mut session = EditSession::compose(services, Config::default(), draft, "dana");

    let submitted = session.submit().await.unwrap();
    assert_eq!(submitted.status, RecordStatus::Pending);

    let server = store.get(&submitted.id).await.unwrap().unwrap();
    assert_eq!(server.status, RecordStatus::Pending);
    assert_eq!(server.title, "Planning workshop");
}

#[tokio::test]
async fn test_submit_rejects_incomplete_draft() {
    let store = Arc::new(InMemoryRecordStore::new());
    let (services, _) = build_services(store);

    // No room, no end time.
    let draft = ReservationRecord::new("Half-finished", Utc::now());
    let mut session = EditSession::compose(services, Config::default(), draft, "dana");

    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, RotaError::Validation(_)));
    assert_eq!(session.state(), SessionState::Open);
}

#[tokio::test]
async fn test_reject_carries_reason_to_record() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.seed(pending_record("rec-1", "Overlong booking")).await;
    let (services, _) = build_services(store);

    let mut session = EditSession::open(services, Config::default(), "rec-1", "alice")
        .await
        .unwrap();
    session.reject("Room is reserved for maintenance").await.unwrap();
    let outcome = session
        .reject("Room is reserved for maintenance")
        .await
        .unwrap();
    match outcome {
        ActionOutcome::Committed(record) => {
            assert_eq!(record.status, RecordStatus::Rejected);
            assert_eq!(
                record.rejection_reason.as_deref(),
                Some("Room is reserved for maintenance")
            );
        }
        other => panic!("expected commit, got {other:?}"),
    }
}
