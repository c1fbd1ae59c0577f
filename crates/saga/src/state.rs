//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a contract-issuance saga.
///
/// State transitions:
/// ```text
/// NotStarted ─► Verifying ─► Verified ─► Creating ─► Created ─► Notifying ─► Completed
///                   │                        │                      │
///                   └────────────────────────┴──────────┬───────────┘
///                                                       ▼
///                              Compensating ─► Compensated ─► Failed
/// ```
///
/// A failure while verifying or creating leads straight to `Failed`; only a
/// failure after the contract was created passes through compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    #[default]
    NotStarted,
    Verifying,
    Verified,
    Creating,
    Created,
    Notifying,
    Completed,
    Compensating,
    Compensated,
    Failed,
}

impl SagaState {
    /// Returns true if the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        use SagaState::*;

        match (self, next) {
            (NotStarted, Verifying)
            | (Verifying, Verified)
            | (Verified, Creating)
            | (Creating, Created)
            | (Created, Notifying)
            | (Notifying, Completed)
            | (Created | Notifying, Compensating)
            | (Compensating, Compensated)
            | (Compensated, Failed) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Verifying => "Verifying",
            SagaState::Verified => "Verified",
            SagaState::Creating => "Creating",
            SagaState::Created => "Created",
            SagaState::Notifying => "Notifying",
            SagaState::Completed => "Completed",
            SagaState::Compensating => "Compensating",
            SagaState::Compensated => "Compensated",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
