//! Recurrence pattern and range types.
//!
//! Patterns are validated at construction: a weekly pattern always carries at
//! least one weekday, and intervals are always positive. Expansion never has
//! to re-check these invariants.

use chrono::{NaiveDate, Weekday};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

// ============================================================================
// Pattern Types
// ============================================================================

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Get a human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Yearly => "Yearly",
        }
    }
}

/// A validated recurrence pattern.
///
/// Weekday indices follow chrono's `num_days_from_monday`: 0=Mon .. 6=Sun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RecurrencePattern {
    /// The recurrence frequency.
    pub frequency: Frequency,
    /// Interval between occurrences (e.g. every 2 weeks).
    pub interval: u32,
    /// Days of week, required and non-empty for weekly patterns.
    #[serde(default)]
    pub days_of_week: Vec<u8>,
}

impl RecurrencePattern {
    /// Create a daily pattern.
    pub fn daily(interval: u32) -> Result<Self> {
        Self::new(Frequency::Daily, interval, Vec::new())
    }

    /// Create a weekly pattern on specific weekdays.
    pub fn weekly_on(interval: u32, days: impl IntoIterator<Item = Weekday>) -> Result<Self> {
        let days = days
            .into_iter()
            .map(|d| d.num_days_from_monday() as u8)
            .collect();
        Self::new(Frequency::Weekly, interval, days)
    }

    /// Create a monthly pattern.
    pub fn monthly(interval: u32) -> Result<Self> {
        Self::new(Frequency::Monthly, interval, Vec::new())
    }

    /// Create a yearly pattern.
    pub fn yearly(interval: u32) -> Result<Self> {
        Self::new(Frequency::Yearly, interval, Vec::new())
    }

    /// Create and validate a pattern.
    pub fn new(frequency: Frequency, interval: u32, mut days_of_week: Vec<u8>) -> Result<Self> {
        if interval == 0 {
            return Err(ValidationError::NonPositiveInterval.into());
        }
        if let Some(&bad) = days_of_week.iter().find(|&&d| d > 6) {
            return Err(ValidationError::InvalidWeekday(bad).into());
        }
        if frequency == Frequency::Weekly && days_of_week.is_empty() {
            return Err(ValidationError::EmptyWeekdaySet.into());
        }
        days_of_week.sort_unstable();
        days_of_week.dedup();
        Ok(Self {
            frequency,
            interval,
            days_of_week,
        })
    }

    /// Add a weekday to a weekly pattern.
    pub fn add_weekday(&mut self, day: Weekday) {
        let idx = day.num_days_from_monday() as u8;
        if !self.days_of_week.contains(&idx) {
            self.days_of_week.push(idx);
            self.days_of_week.sort_unstable();
        }
    }

    /// Remove a weekday from a weekly pattern. Removing the last selected
    /// weekday is disallowed.
    pub fn remove_weekday(&mut self, day: Weekday) -> Result<()> {
        let idx = day.num_days_from_monday() as u8;
        if self.frequency == Frequency::Weekly
            && self.days_of_week.len() == 1
            && self.days_of_week[0] == idx
        {
            return Err(ValidationError::LastWeekday.into());
        }
        self.days_of_week.retain(|&d| d != idx);
        Ok(())
    }

    /// Check whether a weekday participates in this pattern.
    pub fn includes_weekday(&self, day: Weekday) -> bool {
        self.days_of_week
            .contains(&(day.num_days_from_monday() as u8))
    }
}

// ============================================================================
// Range Types
// ============================================================================

/// How a recurrence range ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndCondition {
    /// The series ends on a fixed date (inclusive).
    EndDate { date: NaiveDate },
    /// The series ends after N occurrences, counted from the series start.
    OccurrenceCount { count: u32 },
    /// The series repeats indefinitely.
    Unbounded,
}

/// The date range a recurrence pattern applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RecurrenceRange {
    /// First date of the series; dates before it never qualify.
    pub start_date: NaiveDate,
    /// End condition.
    pub end: EndCondition,
}

impl RecurrenceRange {
    /// Create an unbounded range.
    pub fn starting(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            end: EndCondition::Unbounded,
        }
    }

    /// Create a range ending on a fixed date.
    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end: EndCondition::EndDate { date: end_date },
        }
    }

    /// Create a range ending after N occurrences.
    pub fn counted(start_date: NaiveDate, count: u32) -> Self {
        Self {
            start_date,
            end: EndCondition::OccurrenceCount { count },
        }
    }
}

// ============================================================================
// Overlay (pattern + ad-hoc edits)
// ============================================================================

/// A full recurrence definition: pattern, range, and ad-hoc overlay dates.
///
/// Exclusions suppress pattern dates and always win over a pattern match.
/// Additions are explicit one-off dates outside the pattern; an addition that
/// the pattern already covers is redundant and pruned by [`normalize`].
///
/// [`normalize`]: Recurrence::normalize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Recurrence {
    /// The recurrence pattern.
    pub pattern: RecurrencePattern,
    /// The date range the pattern applies to.
    pub range: RecurrenceRange,
    /// Ad-hoc dates added outside the pattern.
    #[serde(default)]
    pub additions: Vec<NaiveDate>,
    /// Pattern dates suppressed from the series.
    #[serde(default)]
    pub exclusions: Vec<NaiveDate>,
}

impl Recurrence {
    /// Create a recurrence with no overlay dates.
    pub fn new(pattern: RecurrencePattern, range: RecurrenceRange) -> Self {
        Self {
            pattern,
            range,
            additions: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    /// Add an ad-hoc occurrence date.
    pub fn with_addition(mut self, date: NaiveDate) -> Self {
        self.add_addition(date);
        self
    }

    /// Suppress a pattern date.
    pub fn with_exclusion(mut self, date: NaiveDate) -> Self {
        self.add_exclusion(date);
        self
    }

    /// Add an ad-hoc occurrence date.
    pub fn add_addition(&mut self, date: NaiveDate) {
        if !self.additions.contains(&date) {
            self.additions.push(date);
            self.additions.sort_unstable();
        }
        self.normalize();
    }

    /// Suppress a pattern date. Idempotent against redundant exclusions.
    pub fn add_exclusion(&mut self, date: NaiveDate) {
        if !self.exclusions.contains(&date) {
            self.exclusions.push(date);
            self.exclusions.sort_unstable();
        }
    }

    /// Replace the pattern, then re-normalize the overlay.
    pub fn set_pattern(&mut self, pattern: RecurrencePattern) {
        self.pattern = pattern;
        self.normalize();
    }

    /// Replace the range, then re-normalize the overlay.
    pub fn set_range(&mut self, range: RecurrenceRange) {
        self.range = range;
        self.normalize();
    }

    /// Prune additions the pattern already covers. Exclusions are kept even
    /// when the pattern no longer emits the date, so a later pattern edit
    /// cannot resurrect a suppressed occurrence.
    pub fn normalize(&mut self) {
        let pattern = &self.pattern;
        let range = &self.range;
        self.additions
            .retain(|&d| !super::engine::matches_pattern(pattern, range, d));
    }
}
