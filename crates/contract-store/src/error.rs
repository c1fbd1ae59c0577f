use common::{ContractId, ProposalId};
use thiserror::Error;

/// Errors that can occur when interacting with the contract repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A contract already exists for the proposal.
    /// Raised by the storage-level uniqueness constraint.
    #[error("Constraint violation: a contract already exists for proposal {proposal_id}")]
    ConstraintViolation { proposal_id: ProposalId },

    /// The contract to update does not exist.
    #[error("Contract not found: {0}")]
    NotFound(ContractId),

    /// A stored row could not be turned back into a contract.
    #[error("Corrupt contract record: {0}")]
    CorruptRecord(String),

    /// The store is not reachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;
