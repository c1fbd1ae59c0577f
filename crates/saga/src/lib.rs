//! Contract-issuance saga.
//!
//! This crate provides a generic step executor for orchestrated sagas and the
//! contract-issuance saga built on it:
//! 1. Verify the proposal is approved
//! 2. Create the contract
//! 3. Publish the contract-created event
//!
//! If the publish fails after the contract was created, the contract is
//! cancelled and the publish error is returned. Steps never run in parallel
//! and nothing is retried.

pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod instance;
pub mod issuance;
pub mod services;
pub mod state;
pub mod step;

pub use coordinator::{ContractIssuanceSaga, IssuanceRun};
pub use error::{ErrorKind, Result, SagaError};
pub use handlers::{ContractHandler, GetContract, GetProposal, IssueContract, ListContracts};
pub use instance::SagaInstance;
pub use issuance::IssuanceContext;
pub use services::{
    HttpProposalClient, InMemoryProposalClient, ProposalClientError, ProposalQueryClient,
};
pub use state::SagaState;
pub use step::{SagaExecutor, SagaStep};
