//! Field-level diffs for version conflict resolution.
//!
//! When a guarded write is rejected, the session renders the current server
//! state next to the attempted local state as a structured, per-field diff
//! so the user can decide what to discard.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::record::{ConflictKind, ConflictReport, ReservationRecord};

/// One field that differs between server and local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldChange {
    /// Field name.
    pub field: String,
    /// The server's current value.
    pub current: String,
    /// The value the editor attempted to write.
    pub attempted: String,
}

/// A rendered conflict: the classified report plus its per-field changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionConflict {
    /// Why the write was rejected.
    pub kind: ConflictKind,
    /// The raw report from the store.
    pub report: ConflictReport,
    /// Fields that differ between the server state and the local edit.
    pub changes: Vec<FieldChange>,
}

impl SessionConflict {
    /// Render a report against the session's own working copy.
    pub fn render(report: ConflictReport, local: &ReservationRecord) -> Self {
        let changes = diff_records(&report.current, local);
        Self {
            kind: report.kind,
            report,
            changes,
        }
    }
}

fn opt_str(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "(none)".to_string())
}

fn push_if_differs(changes: &mut Vec<FieldChange>, field: &str, current: String, attempted: String) {
    if current != attempted {
        changes.push(FieldChange {
            field: field.to_string(),
            current,
            attempted,
        });
    }
}

/// Compute the user-facing field differences between two record states.
pub fn diff_records(current: &ReservationRecord, attempted: &ReservationRecord) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    push_if_differs(
        &mut changes,
        "title",
        current.title.clone(),
        attempted.title.clone(),
    );
    push_if_differs(
        &mut changes,
        "description",
        opt_str(&current.description),
        opt_str(&attempted.description),
    );
    push_if_differs(
        &mut changes,
        "room",
        opt_str(&current.room_id),
        opt_str(&attempted.room_id),
    );
    push_if_differs(
        &mut changes,
        "start",
        current.start.to_rfc3339(),
        attempted.start.to_rfc3339(),
    );
    push_if_differs(
        &mut changes,
        "end",
        current
            .end
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| "(none)".to_string()),
        attempted
            .end
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| "(none)".to_string()),
    );
    push_if_differs(
        &mut changes,
        "status",
        current.status.display_name().to_string(),
        attempted.status.display_name().to_string(),
    );
    push_if_differs(
        &mut changes,
        "rejection_reason",
        opt_str(&current.rejection_reason),
        opt_str(&attempted.rejection_reason),
    );
    push_if_differs(
        &mut changes,
        "recurrence",
        current
            .recurrence
            .as_ref()
            .map(|r| format!("{} every {}", r.pattern.frequency.display_name(), r.pattern.interval))
            .unwrap_or_else(|| "(none)".to_string()),
        attempted
            .recurrence
            .as_ref()
            .map(|r| format!("{} every {}", r.pattern.frequency.display_name(), r.pattern.interval))
            .unwrap_or_else(|| "(none)".to_string()),
    );

    changes
}
