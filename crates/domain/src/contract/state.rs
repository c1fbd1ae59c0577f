//! Contract status state machine.

use serde::{Deserialize, Serialize};

/// The status of a contract in its lifecycle.
///
/// State transitions:
/// ```text
/// Active ◄──► Suspended
///   │             │
///   ├─────────────┴──► Expired
///   │             │       │
///   └─────────────┴───────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContractStatus {
    /// Contract is in force.
    #[default]
    Active,

    /// Contract was cancelled (terminal state).
    Cancelled,

    /// Contract is temporarily not in force.
    Suspended,

    /// Contract reached the end of its term.
    Expired,
}

impl ContractStatus {
    /// Returns true if the contract can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        !matches!(self, ContractStatus::Cancelled)
    }

    /// Returns true if the contract can be suspended in this status.
    pub fn can_suspend(&self) -> bool {
        matches!(self, ContractStatus::Active)
    }

    /// Returns true if the contract can be reactivated in this status.
    pub fn can_reactivate(&self) -> bool {
        matches!(self, ContractStatus::Suspended)
    }

    /// Returns true if the contract can expire in this status.
    pub fn can_expire(&self) -> bool {
        !matches!(self, ContractStatus::Cancelled)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Cancelled)
    }

    /// Returns the status name as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "Active",
            ContractStatus::Cancelled => "Cancelled",
            ContractStatus::Suspended => "Suspended",
            ContractStatus::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown contract status: {0}")]
pub struct UnknownContractStatus(pub String);

impl std::str::FromStr for ContractStatus {
    type Err = UnknownContractStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(ContractStatus::Active),
            "Cancelled" => Ok(ContractStatus::Cancelled),
            "Suspended" => Ok(ContractStatus::Suspended),
            "Expired" => Ok(ContractStatus::Expired),
            other => Err(UnknownContractStatus(other.to_string())),
        }
    }
}
