//! Saga error types.

use common::{ContractId, ProposalId};
use contract_store::StoreError;
use domain::{ContractError, ProposalStatus, ValidationErrors};
use messaging::MessagingError;
use thiserror::Error;

use crate::services::ProposalClientError;
use crate::state::SagaState;

/// Failure classes callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input.
    Validation,
    /// A referenced proposal or contract does not exist.
    NotFound,
    /// A business rule refused the request.
    BusinessRule,
    /// A remote service or the broker could not be reached.
    TransientInfrastructure,
    /// A concurrent request already created the contract.
    ConstraintViolation,
    /// The caller cancelled the request.
    Cancelled,
    /// A bug or an unexpected condition.
    Internal,
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request failed field validation.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// The proposal service does not know the proposal.
    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    /// The proposal exists but is not approved.
    #[error("Proposal {proposal_id} is not approved (status: {status})")]
    ProposalNotApproved {
        proposal_id: ProposalId,
        status: ProposalStatus,
    },

    /// A contract already exists for the proposal.
    #[error("Proposal {0} already has a contract")]
    AlreadyContracted(ProposalId),

    /// The contract does not exist.
    #[error("Contract not found: {0}")]
    ContractNotFound(ContractId),

    /// A contract status transition was refused.
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    /// A concurrent issuance won the race for the proposal.
    #[error("Constraint violation: a contract already exists for proposal {proposal_id}")]
    ConstraintViolation { proposal_id: ProposalId },

    /// The proposal service call failed.
    #[error("Proposal service error: {0}")]
    ProposalService(#[from] ProposalClientError),

    /// The contract repository failed.
    #[error("Contract store error: {0}")]
    Store(StoreError),

    /// Publishing or consuming a message failed.
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// The request was cancelled before the saga finished.
    #[error("Saga cancelled")]
    Cancelled,

    /// The saga attempted a transition its state machine does not allow.
    #[error("Invalid saga transition from {from} to {to}")]
    InvalidTransition { from: SagaState, to: SagaState },

    /// A step did not leave the context in the expected shape.
    #[error("Saga step '{step}' produced no {missing}")]
    MissingOutput {
        step: &'static str,
        missing: &'static str,
    },
}

impl SagaError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::Validation(_) => ErrorKind::Validation,
            SagaError::ProposalNotFound(_) | SagaError::ContractNotFound(_) => ErrorKind::NotFound,
            SagaError::ProposalNotApproved { .. }
            | SagaError::AlreadyContracted(_)
            | SagaError::Contract(_) => ErrorKind::BusinessRule,
            SagaError::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            SagaError::ProposalService(e) => match e {
                ProposalClientError::InvalidResponse(_) | ProposalClientError::InvalidUrl(_) => {
                    ErrorKind::Internal
                }
                _ => ErrorKind::TransientInfrastructure,
            },
            SagaError::Store(e) => match e {
                StoreError::Database(_) | StoreError::Unavailable(_) => {
                    ErrorKind::TransientInfrastructure
                }
                _ => ErrorKind::Internal,
            },
            SagaError::Messaging(e) => match e {
                MessagingError::Serialization(_) => ErrorKind::Internal,
                _ => ErrorKind::TransientInfrastructure,
            },
            SagaError::Cancelled => ErrorKind::Cancelled,
            SagaError::InvalidTransition { .. } | SagaError::MissingOutput { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<StoreError> for SagaError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConstraintViolation { proposal_id } => {
                SagaError::ConstraintViolation { proposal_id }
            }
            StoreError::NotFound(id) => SagaError::ContractNotFound(id),
            other => SagaError::Store(other),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
