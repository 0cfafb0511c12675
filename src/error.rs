//! Error types for alarm operations.
//! Every variant carries a stable, user-facing message.

use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// Remote Service Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures reported by the remote alarm scheduling service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid alarm configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Alarm {0} is unknown to the scheduling service")]
    UnknownAlarm(Uuid),

    #[error("Scheduling service refused the request: not authorized")]
    Unauthorized,

    #[error("Scheduling service unavailable: {0}")]
    Transport(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Operation Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors an alarm operation can surface.
///
/// A failed operation leaves the running and recent collections untouched.
#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    #[error("Not authorized to access alarm!")]
    NotAuthorized,

    #[error("Unknown authorization state!")]
    UnknownAuthorizationState,

    #[error("Fail to create an alarm schedule!")]
    InvalidSchedule,

    #[error("Alarm Not Found")]
    AlarmNotFound(Uuid),

    #[error("Either a schedule, a countdown or a snooze must be set!")]
    NothingToSchedule,

    #[error(transparent)]
    Remote(#[from] ServiceError),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl AlarmError {
    /// Single human-readable line for display.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Convenience type alias for Results using AlarmError.
pub type Result<T> = std::result::Result<T, AlarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_stable() {
        assert_eq!(
            AlarmError::NotAuthorized.message(),
            "Not authorized to access alarm!"
        );
        assert_eq!(
            AlarmError::UnknownAuthorizationState.message(),
            "Unknown authorization state!"
        );
        assert_eq!(
            AlarmError::InvalidSchedule.message(),
            "Fail to create an alarm schedule!"
        );
        assert_eq!(AlarmError::AlarmNotFound(Uuid::nil()).message(), "Alarm Not Found");
    }

    #[test]
    fn test_remote_errors_pass_through() {
        let err = AlarmError::from(ServiceError::Transport("offline".into()));
        assert_eq!(err.message(), "Scheduling service unavailable: offline");
    }
}
