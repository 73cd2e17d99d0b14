//! Approval lifecycle state machine.
//!
//! draft --submit--> pending --approve/reject--> approved/rejected, with soft
//! delete from any non-deleted status and restore back to the remembered
//! prior status. Transition legality is enforced here; the version protocol
//! is enforced by the store.

use crate::error::StoreError;

use super::types::RecordStatus;

/// A lifecycle transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Submit,
    Approve,
    Reject,
    Delete,
    Restore,
}

impl LifecycleAction {
    /// Get a human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            LifecycleAction::Submit => "submit",
            LifecycleAction::Approve => "approve",
            LifecycleAction::Reject => "reject",
            LifecycleAction::Delete => "delete",
            LifecycleAction::Restore => "restore",
        }
    }

    /// The status the editor expects the record to be in for this action,
    /// when the action is only legal from one status.
    pub fn expected_status(&self) -> Option<RecordStatus> {
        match self {
            LifecycleAction::Submit => Some(RecordStatus::Draft),
            LifecycleAction::Approve | LifecycleAction::Reject => Some(RecordStatus::Pending),
            LifecycleAction::Restore => Some(RecordStatus::Deleted),
            LifecycleAction::Delete => None,
        }
    }
}

/// Compute the status an action transitions to, or reject the transition.
///
/// `previous` is the status remembered at soft-delete time, consumed by
/// `restore`.
pub fn next_status(
    current: RecordStatus,
    previous: Option<RecordStatus>,
    action: LifecycleAction,
) -> Result<RecordStatus, StoreError> {
    let invalid = || StoreError::InvalidTransition {
        from: current,
        action: action.display_name().to_string(),
    };

    match action {
        LifecycleAction::Submit => match current {
            RecordStatus::Draft => Ok(RecordStatus::Pending),
            _ => Err(invalid()),
        },
        LifecycleAction::Approve => match current {
            RecordStatus::Pending => Ok(RecordStatus::Approved),
            _ => Err(invalid()),
        },
        LifecycleAction::Reject => match current {
            RecordStatus::Pending => Ok(RecordStatus::Rejected),
            _ => Err(invalid()),
        },
        LifecycleAction::Delete => match current {
            RecordStatus::Deleted => Err(invalid()),
            _ => Ok(RecordStatus::Deleted),
        },
        LifecycleAction::Restore => match current {
            RecordStatus::Deleted => Ok(previous.unwrap_or(RecordStatus::Draft)),
            _ => Err(invalid()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_flow() {
        let s = next_status(RecordStatus::Draft, None, LifecycleAction::Submit).unwrap();
        assert_eq!(s, RecordStatus::Pending);

        let s = next_status(s, None, LifecycleAction::Approve).unwrap();
        assert_eq!(s, RecordStatus::Approved);
    }

    #[test]
    fn test_reject_only_from_pending() {
        assert!(next_status(RecordStatus::Draft, None, LifecycleAction::Reject).is_err());
        assert!(next_status(RecordStatus::Approved, None, LifecycleAction::Reject).is_err());
        assert_eq!(
            next_status(RecordStatus::Pending, None, LifecycleAction::Reject).unwrap(),
            RecordStatus::Rejected
        );
    }

    #[test]
    fn test_terminal_states_remain_deletable() {
        assert_eq!(
            next_status(RecordStatus::Approved, None, LifecycleAction::Delete).unwrap(),
            RecordStatus::Deleted
        );
        assert_eq!(
            next_status(RecordStatus::Rejected, None, LifecycleAction::Delete).unwrap(),
            RecordStatus::Deleted
        );
        assert!(next_status(RecordStatus::Deleted, None, LifecycleAction::Delete).is_err());
    }

    #[test]
    fn test_restore_returns_to_previous_status() {
        let s = next_status(
            RecordStatus::Deleted,
            Some(RecordStatus::Approved),
            LifecycleAction::Restore,
        )
        .unwrap();
        assert_eq!(s, RecordStatus::Approved);

        assert!(next_status(RecordStatus::Pending, None, LifecycleAction::Restore).is_err());
    }

    #[test]
    fn test_double_submit_rejected() {
        assert!(next_status(RecordStatus::Pending, None, LifecycleAction::Submit).is_err());
    }
}
