//! Contract aggregate and related types.

mod aggregate;
mod events;
mod state;

pub use aggregate::Contract;
pub use events::ContractCreated;
pub use state::{ContractStatus, UnknownContractStatus};

use thiserror::Error;

/// Errors raised by contract status transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// Cancel was called on a contract that is already cancelled.
    #[error("Contract is already cancelled")]
    AlreadyCancelled,

    /// The contract is not in a status that allows the requested action.
    #[error("Invalid status transition: cannot {action} from {current_status} status")]
    InvalidStatusTransition {
        current_status: ContractStatus,
        action: &'static str,
    },
}
