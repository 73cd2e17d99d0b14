//! Pure recurrence expansion.
//!
//! All qualification tests are computed as an integer difference from the
//! range's start date modulo the pattern interval. Week-boundary arithmetic
//! for weekly intervals uses a fixed Sunday first-day-of-week, independent of
//! the weekdays selected in the pattern.
//!
//! Monthly patterns qualify on literal day-of-month equality, so a series
//! anchored on day 29-31 emits nothing for months without that day (the
//! month is skipped, never clamped).

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};

use super::types::{EndCondition, Frequency, Recurrence, RecurrencePattern, RecurrenceRange};
use crate::record::{OccurrenceException, ReservationRecord};

/// Hard cap on dates materialized by a single expansion call.
const MAX_OCCURRENCES: usize = 10_000;

/// The Sunday starting the week containing `date`.
fn sunday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// Pattern membership relative to the series start, ignoring end conditions.
fn matches_base(pattern: &RecurrencePattern, start: NaiveDate, date: NaiveDate) -> bool {
    let interval = pattern.interval as i64;
    match pattern.frequency {
        Frequency::Daily => (date - start).num_days() % interval == 0,
        Frequency::Weekly => {
            pattern
                .days_of_week
                .contains(&(date.weekday().num_days_from_monday() as u8))
                && ((sunday_of(date) - sunday_of(start)).num_days() / 7) % interval == 0
        }
        Frequency::Monthly => {
            date.day() == start.day() && {
                let months = (date.year() as i64 - start.year() as i64) * 12
                    + (date.month() as i64 - start.month() as i64);
                months % interval == 0
            }
        }
        Frequency::Yearly => {
            date.month() == start.month()
                && date.day() == start.day()
                && (date.year() as i64 - start.year() as i64) % interval == 0
        }
    }
}

/// Check whether a date qualifies under a pattern and range, end condition
/// included. Occurrence-count ranges are counted from the true series start.
pub fn matches_pattern(pattern: &RecurrencePattern, range: &RecurrenceRange, date: NaiveDate) -> bool {
    if date < range.start_date {
        return false;
    }
    match range.end {
        EndCondition::EndDate { date: end } => {
            date <= end && matches_base(pattern, range.start_date, date)
        }
        EndCondition::OccurrenceCount { count } => {
            if !matches_base(pattern, range.start_date, date) {
                return false;
            }
            let mut seen = 0u32;
            let mut d = range.start_date;
            while d <= date {
                if matches_base(pattern, range.start_date, d) {
                    seen += 1;
                    if d == date {
                        return seen <= count;
                    }
                    if seen >= count {
                        return false;
                    }
                }
                let Some(next) = d.succ_opt() else { break };
                d = next;
            }
            false
        }
        EndCondition::Unbounded => matches_base(pattern, range.start_date, date),
    }
}

/// Compute the sorted pattern dates within a query window.
///
/// The window only restricts which dates are returned; for occurrence-count
/// ranges, counting always starts at the series start date even when the
/// window begins later.
pub fn occurrences_in_window(
    pattern: &RecurrencePattern,
    range: &RecurrenceRange,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    if window_end < window_start {
        return out;
    }

    match range.end {
        EndCondition::OccurrenceCount { count } => {
            let mut seen = 0u32;
            let mut d = range.start_date;
            while d <= window_end && seen < count && out.len() < MAX_OCCURRENCES {
                if matches_base(pattern, range.start_date, d) {
                    seen += 1;
                    if d >= window_start {
                        out.push(d);
                    }
                }
                let Some(next) = d.succ_opt() else { break };
                d = next;
            }
        }
        _ => {
            let upper = match range.end {
                EndCondition::EndDate { date } => window_end.min(date),
                _ => window_end,
            };
            let mut d = window_start.max(range.start_date);
            while d <= upper && out.len() < MAX_OCCURRENCES {
                if matches_base(pattern, range.start_date, d) {
                    out.push(d);
                }
                let Some(next) = d.succ_opt() else { break };
                d = next;
            }
        }
    }

    out
}

/// Pattern dates with the ad-hoc overlay applied: additions merged in,
/// exclusions removed. An exclusion wins over both a pattern match and an
/// addition.
pub fn occurrence_dates(
    recurrence: &Recurrence,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<NaiveDate> {
    let mut dates = occurrences_in_window(
        &recurrence.pattern,
        &recurrence.range,
        window_start,
        window_end,
    );
    for &added in &recurrence.additions {
        if added >= window_start && added <= window_end && !dates.contains(&added) {
            dates.push(added);
        }
    }
    dates.retain(|d| !recurrence.exclusions.contains(d));
    dates.sort_unstable();
    dates
}

/// Expand a recurring master record into concrete occurrence records.
///
/// For each occurrence date in the window: a cancelled exception omits the
/// occurrence; a non-cancelled exception merges its overridden fields over
/// the master; otherwise the occurrence inherits every master field with only
/// date/time shifted. A non-recurring record expands to itself.
pub fn expand_series(
    master: &ReservationRecord,
    window_start: NaiveDate,
    window_end: NaiveDate,
    exceptions: &[OccurrenceException],
) -> Vec<ReservationRecord> {
    let Some(ref recurrence) = master.recurrence else {
        return vec![master.clone()];
    };

    let by_date: HashMap<NaiveDate, &OccurrenceException> = exceptions
        .iter()
        .map(|e| (e.occurrence_date, e))
        .collect();

    let mut out = Vec::new();
    for date in occurrence_dates(recurrence, window_start, window_end) {
        match by_date.get(&date) {
            Some(exc) if exc.cancelled => continue,
            Some(exc) => {
                let mut occ = synthesize_occurrence(master, date);
                if let Some(ref overrides) = exc.overrides {
                    overrides.apply_to(&mut occ);
                }
                out.push(occ);
            }
            None => out.push(synthesize_occurrence(master, date)),
        }
    }
    out
}

/// Build the concrete occurrence of `master` on `date`.
///
/// The occurrence id is derived from the master id and the date, so expanded
/// instances are stable and addressable across calls.
pub fn synthesize_occurrence(master: &ReservationRecord, date: NaiveDate) -> ReservationRecord {
    let mut occ = master.clone();
    occ.id = format!("{}-{}", master.id, date);
    occ.series_master_id = Some(master.id.clone());
    occ.occurrence_date = Some(date);
    occ.recurrence = None;

    let duration = occ.end.map(|e| e - occ.start);
    let start = date.and_time(master.start.time()).and_utc();
    occ.start = start;
    occ.end = duration.map(|d| start + d);
    occ
}
