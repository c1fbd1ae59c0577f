use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{ContractId, ProposalId};
use domain::Contract;
use tokio::sync::RwLock;

use crate::{ContractRepository, Result, StoreError};

#[derive(Default)]
struct Contracts {
    by_id: HashMap<ContractId, Contract>,
    /// Unique index: proposal -> contract.
    by_proposal: HashMap<ProposalId, ContractId>,
}

/// In-memory contract repository for testing and local runs.
///
/// The uniqueness check and the insert happen under one write lock, so the
/// one-contract-per-proposal rule holds under concurrent `add` calls exactly
/// as it does with the database constraint.
#[derive(Clone, Default)]
pub struct InMemoryContractRepository {
    contracts: Arc<RwLock<Contracts>>,
    fail_on_add: Arc<AtomicBool>,
    fail_on_update: Arc<AtomicBool>,
}

impl InMemoryContractRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `add` fail as if the store were unreachable.
    pub fn set_fail_on_add(&self, fail: bool) {
        self.fail_on_add.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `update` fail as if the store were unreachable.
    pub fn set_fail_on_update(&self, fail: bool) {
        self.fail_on_update.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of stored contracts.
    pub async fn contract_count(&self) -> usize {
        self.contracts.read().await.by_id.len()
    }

    /// Removes every contract.
    pub async fn clear(&self) {
        let mut contracts = self.contracts.write().await;
        contracts.by_id.clear();
        contracts.by_proposal.clear();
    }
}

#[async_trait]
impl ContractRepository for InMemoryContractRepository {
    async fn get_by_id(&self, id: ContractId) -> Result<Option<Contract>> {
        Ok(self.contracts.read().await.by_id.get(&id).cloned())
    }

    async fn get_by_proposal_id(&self, proposal_id: ProposalId) -> Result<Option<Contract>> {
        let contracts = self.contracts.read().await;
        Ok(contracts
            .by_proposal
            .get(&proposal_id)
            .and_then(|id| contracts.by_id.get(id))
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Contract>> {
        let mut all: Vec<Contract> = self.contracts.read().await.by_id.values().cloned().collect();
        all.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(all)
    }

    async fn add(&self, contract: &Contract) -> Result<()> {
        if self.fail_on_add.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated add failure".to_string()));
        }

        let mut contracts = self.contracts.write().await;
        let proposal_id = contract.proposal_id();

        if contracts.by_proposal.contains_key(&proposal_id) {
            return Err(StoreError::ConstraintViolation { proposal_id });
        }

        contracts.by_proposal.insert(proposal_id, contract.id());
        contracts.by_id.insert(contract.id(), contract.clone());
        Ok(())
    }

    async fn update(&self, contract: &Contract) -> Result<()> {
        if self.fail_on_update.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated update failure".to_string()));
        }

        let mut contracts = self.contracts.write().await;
        let stored = contracts
            .by_id
            .get_mut(&contract.id())
            .ok_or(StoreError::NotFound(contract.id()))?;

        // Identity, proposal and dates are fixed at insert time.
        *stored = Contract::restore(
            stored.id(),
            stored.proposal_id(),
            stored.contract_date(),
            contract.status(),
            stored.created_at(),
            contract.updated_at(),
        );
        Ok(())
    }

    async fn exists_for_proposal(&self, proposal_id: ProposalId) -> Result<bool> {
        Ok(self.contracts.read().await.by_proposal.contains_key(&proposal_id))
    }
}
