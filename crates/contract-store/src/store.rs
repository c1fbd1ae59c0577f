use std::sync::Arc;

use async_trait::async_trait;
use common::{ContractId, ProposalId};
use domain::Contract;

use crate::Result;

/// Core trait for contract repositories.
///
/// Every write is committed atomically before the call returns.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ContractRepository: Send + Sync {
    /// Loads a contract by its ID.
    async fn get_by_id(&self, id: ContractId) -> Result<Option<Contract>>;

    /// Loads the contract issued for a proposal, if any.
    async fn get_by_proposal_id(&self, proposal_id: ProposalId) -> Result<Option<Contract>>;

    /// Lists all contracts, newest first.
    async fn list_all(&self) -> Result<Vec<Contract>>;

    /// Inserts a new contract.
    ///
    /// Fails with `ConstraintViolation` if a contract already exists for the
    /// same proposal; the existing row is never overwritten.
    async fn add(&self, contract: &Contract) -> Result<()>;

    /// Persists the mutable state (status, `updated_at`) of an existing contract.
    ///
    /// Fails with `NotFound` if the contract was never added.
    async fn update(&self, contract: &Contract) -> Result<()>;

    /// Returns true if a contract exists for the proposal.
    ///
    /// Fast-fail shortcut only: a concurrent `add` may still win the race.
    async fn exists_for_proposal(&self, proposal_id: ProposalId) -> Result<bool>;
}

#[async_trait]
impl<T: ContractRepository + ?Sized> ContractRepository for Arc<T> {
    async fn get_by_id(&self, id: ContractId) -> Result<Option<Contract>> {
        (**self).get_by_id(id).await
    }

    async fn get_by_proposal_id(&self, proposal_id: ProposalId) -> Result<Option<Contract>> {
        (**self).get_by_proposal_id(proposal_id).await
    }

    async fn list_all(&self) -> Result<Vec<Contract>> {
        (**self).list_all().await
    }

    async fn add(&self, contract: &Contract) -> Result<()> {
        (**self).add(contract).await
    }

    async fn update(&self, contract: &Contract) -> Result<()> {
        (**self).update(contract).await
    }

    async fn exists_for_proposal(&self, proposal_id: ProposalId) -> Result<bool> {
        (**self).exists_for_proposal(proposal_id).await
    }
}
