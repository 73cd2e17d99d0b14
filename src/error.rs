//! Error types for the reservation calendar core.

use thiserror::Error;

use crate::record::{ConflictReport, RecordStatus, SchedulingConflict};

/// Main error type for rota operations.
#[derive(Error, Debug)]
pub enum RotaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Local validation failures, always resolved before any collaborator call.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Weekly patterns require at least one weekday")]
    EmptyWeekdaySet,

    #[error("Cannot remove the last selected weekday")]
    LastWeekday,

    #[error("Recurrence interval must be at least 1")]
    NonPositiveInterval,

    #[error("Invalid weekday index {0} (expected 0-6)")]
    InvalidWeekday(u8),

    #[error("Title must not be empty")]
    MissingTitle,

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Rejection requires a non-empty reason")]
    MissingRejectionReason,

    #[error("An edit scope must be chosen before writing a recurring series")]
    ScopeRequired,

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),
}

/// Conflicts surfaced to the user, never resolved automatically.
#[derive(Error, Debug)]
pub enum ConflictError {
    #[error("Version conflict ({}) on record {}", .0.kind, .0.current.id)]
    Version(Box<ConflictReport>),

    #[error("Scheduling conflict with {} approved booking(s)", .0.len())]
    Scheduling(Vec<SchedulingConflict>),
}

/// Soft advisory lock errors.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Record is being reviewed by {holder} (lease expires {expires_at})")]
    Held {
        holder: String,
        expires_at: chrono::DateTime<chrono::Utc>,
    },
}

/// Persistence collaborator errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Invalid transition: cannot {action} a {from} record")]
    InvalidTransition { from: RecordStatus, action: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Edit session state machine errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is not open (state: {0})")]
    NotOpen(String),

    #[error("Session is closed")]
    Closed,

    #[error("Force-approve is disabled by configuration")]
    ForceApproveDisabled,
}

/// Result type alias for rota operations.
pub type Result<T> = std::result::Result<T, RotaError>;
