//! Recurrence module: pattern vocabulary and pure expansion engine.
//!
//! The pattern vocabulary is deliberately constrained: daily/weekly/monthly/
//! yearly with a fixed interval and, for weekly, an explicit day-of-week set.
//! Expansion is pure date math with no side effects.

pub mod engine;
mod types;

pub use engine::{
    expand_series, matches_pattern, occurrence_dates, occurrences_in_window,
    synthesize_occurrence,
};
pub use types::{EndCondition, Frequency, Recurrence, RecurrencePattern, RecurrenceRange};
