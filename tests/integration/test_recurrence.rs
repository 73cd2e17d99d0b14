//! Series expansion flows: patterns, overlays, and stored exceptions
//! working together through the public API.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc, Weekday};

use rota::recurrence::{expand_series, occurrence_dates};
use rota::{
    Config, EditScope, EditSession, InMemoryLockService, InMemoryRecordStore,
    Recurrence, RecurrencePattern, RecurrenceRange, RecordStore, RecordingPublisher,
    ReservationPatch, ReservationRecord, SessionServices,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn build_services(store: Arc<InMemoryRecordStore>) -> SessionServices {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    SessionServices {
        store: store.clone(),
        locks: Arc::new(InMemoryLockService::default()),
        availability: store,
        publisher: RecordingPublisher::shared(),
    }
}

fn weekly_master(id: &str) -> ReservationRecord {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let pattern = RecurrencePattern::weekly_on(1, [Weekday::Mon]).unwrap();
    let range = RecurrenceRange::starting(start.date_naive());
    ReservationRecord::with_id(id, "Weekly sync", start)
        .with_room("room-a")
        .with_duration(Duration::hours(1))
        .with_recurrence(Recurrence::new(pattern, range))
}

#[tokio::test]
async fn test_expansion_reflects_stored_overrides() {
    let store = Arc::new(InMemoryRecordStore::new());
    let master = weekly_master("series-1");
    store.seed(master.clone()).await;
    let services = build_services(store.clone());

    // Retitle just the January 8th occurrence through a session.
    let mut session = EditSession::open(services, Config::default(), "series-1", "alice")
        .await
        .unwrap();
    session.set_scope(EditScope::ThisOccurrence {
        date: date(2024, 1, 8),
    });
    session.update(ReservationPatch::retitle("Special session")).unwrap();
    session.save().await.unwrap();
    session.save().await.unwrap();

    let current = store.get("series-1").await.unwrap().unwrap();
    let exceptions = store
        .list_exceptions("series-1", date(2024, 1, 1), date(2024, 1, 31))
        .await
        .unwrap();
    let occurrences = expand_series(&current, date(2024, 1, 1), date(2024, 1, 31), &exceptions);

    assert_eq!(occurrences.len(), 5);
    let jan8 = occurrences
        .iter()
        .find(|o| o.occurrence_date == Some(date(2024, 1, 8)))
        .unwrap();
    assert_eq!(jan8.title, "Special session");
    // Every other occurrence keeps the master's title.
    assert!(occurrences
        .iter()
        .filter(|o| o.occurrence_date != Some(date(2024, 1, 8)))
        .all(|o| o.title == "Weekly sync"));
    // Synthesized occurrences carry the master's time of day.
    assert!(occurrences
        .iter()
        .all(|o| o.start.time() == current.start.time()));
}

#[tokio::test]
async fn test_exclusion_and_addition_overlay_through_patch() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.seed(weekly_master("series-1")).await;
    let services = build_services(store.clone());

    let mut session = EditSession::open(services, Config::default(), "series-1", "alice")
        .await
        .unwrap();
    session.set_scope(EditScope::AllOccurrences);
    session
        .update(ReservationPatch {
            add_exclusions: vec![date(2024, 1, 15)],
            add_additions: vec![date(2024, 1, 16)],
            ..Default::default()
        })
        .unwrap();
    session.save().await.unwrap();
    session.save().await.unwrap();

    let current = store.get("series-1").await.unwrap().unwrap();
    let recurrence = current.recurrence.as_ref().unwrap();
    let dates = occurrence_dates(recurrence, date(2024, 1, 1), date(2024, 1, 31));

    assert!(!dates.contains(&date(2024, 1, 15)));
    assert!(dates.contains(&date(2024, 1, 16)));
    // The remaining pattern dates are untouched.
    assert!(dates.contains(&date(2024, 1, 8)));
    assert!(dates.contains(&date(2024, 1, 22)));
}

#[tokio::test]
async fn test_exclusion_survives_pattern_change() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.seed(weekly_master("series-1")).await;
    let services = build_services(store.clone());

    let mut session = EditSession::open(services, Config::default(), "series-1", "alice")
        .await
        .unwrap();
    session.set_scope(EditScope::AllOccurrences);
    session
        .update(ReservationPatch {
            add_exclusions: vec![date(2024, 1, 15)],
            ..Default::default()
        })
        .unwrap();
    session.save().await.unwrap();
    session.save().await.unwrap();

    // Widen the pattern to Monday and Wednesday. The exclusion still wins.
    let pattern = RecurrencePattern::weekly_on(1, [Weekday::Mon, Weekday::Wed]).unwrap();
    session
        .update(ReservationPatch {
            recurrence: Some(Recurrence::new(
                pattern,
                RecurrenceRange::starting(date(2024, 1, 1)),
            )),
            add_exclusions: vec![date(2024, 1, 15)],
            ..Default::default()
        })
        .unwrap();
    session.save().await.unwrap();
    session.save().await.unwrap();

    let current = store.get("series-1").await.unwrap().unwrap();
    let dates = occurrence_dates(
        current.recurrence.as_ref().unwrap(),
        date(2024, 1, 1),
        date(2024, 1, 31),
    );
    assert!(!dates.contains(&date(2024, 1, 15)));
    assert!(dates.contains(&date(2024, 1, 17)));
}

#[tokio::test]
async fn test_occurrence_count_spans_the_true_series_start() {
    let store = Arc::new(InMemoryRecordStore::new());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let pattern = RecurrencePattern::daily(1).unwrap();
    let range = RecurrenceRange::counted(start.date_naive(), 3);
    let master = ReservationRecord::with_id("series-1", "Short series", start)
        .with_room("room-a")
        .with_duration(Duration::hours(1))
        .with_recurrence(Recurrence::new(pattern, range));
    store.seed(master.clone()).await;

    // A later window sees nothing: the three occurrences are counted from
    // the series start, not from the window edge.
    let none = expand_series(&master, date(2024, 2, 1), date(2024, 2, 28), &[]);
    assert!(none.is_empty());

    let all = expand_series(&master, date(2024, 1, 1), date(2024, 1, 31), &[]);
    let dates: Vec<_> = all.iter().filter_map(|o| o.occurrence_date).collect();
    assert_eq!(
        dates,
        vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)]
    );
}

#[tokio::test]
async fn test_series_preview_capped_by_config() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.seed(
        {
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
            let pattern = RecurrencePattern::daily(1).unwrap();
            ReservationRecord::with_id("series-1", "Every day", start)
                .with_room("room-a")
                .with_duration(Duration::hours(1))
                .with_recurrence(Recurrence::new(
                    pattern,
                    RecurrenceRange::starting(start.date_naive()),
                ))
        },
    )
    .await;
    let services = build_services(store);

    let mut config = Config::default();
    config.recurrence.max_occurrences = 10;
    let session = EditSession::open(services, config, "series-1", "alice")
        .await
        .unwrap();
    assert_eq!(session.occurrence_preview().len(), 10);
}
