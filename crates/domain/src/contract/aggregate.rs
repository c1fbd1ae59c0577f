//! Contract aggregate implementation.

use chrono::{DateTime, SubsecRound, Utc};
use common::{ContractId, ProposalId};
use serde::{Deserialize, Serialize};

use super::{ContractCreated, ContractError, ContractStatus};

/// Contract aggregate root.
///
/// A contract is issued against exactly one approved proposal. The proposal
/// reference, the contract date and the creation timestamp are fixed at
/// construction; only the status (and with it `updated_at`) changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    id: ContractId,
    proposal_id: ProposalId,
    contract_date: DateTime<Utc>,
    status: ContractStatus,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl Contract {
    /// Creates a new active contract for the given proposal.
    ///
    /// Timestamps are truncated to microseconds so they survive a round trip
    /// through PostgreSQL `timestamptz` unchanged.
    pub fn new(proposal_id: ProposalId) -> Self {
        let now = now();
        Self {
            id: ContractId::new(),
            proposal_id,
            contract_date: now,
            status: ContractStatus::Active,
            created_at: now,
            updated_at: None,
        }
    }

    /// Rebuilds a contract from persisted state.
    pub fn restore(
        id: ContractId,
        proposal_id: ProposalId,
        contract_date: DateTime<Utc>,
        status: ContractStatus,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            proposal_id,
            contract_date,
            status,
            created_at,
            updated_at,
        }
    }

    /// Builds the `ContractCreated` fact for this contract.
    pub fn created_event(&self) -> ContractCreated {
        ContractCreated {
            contract_id: self.id,
            proposal_id: self.proposal_id,
            contract_date: self.contract_date,
        }
    }
}

// Status transitions
impl Contract {
    /// Cancels the contract.
    ///
    /// Cancelling twice is an error, not a no-op.
    pub fn cancel(&mut self) -> Result<(), ContractError> {
        if !self.status.can_cancel() {
            return Err(ContractError::AlreadyCancelled);
        }
        self.transition(ContractStatus::Cancelled);
        Ok(())
    }

    /// Suspends an active contract.
    pub fn suspend(&mut self) -> Result<(), ContractError> {
        if !self.status.can_suspend() {
            return Err(self.invalid("suspend"));
        }
        self.transition(ContractStatus::Suspended);
        Ok(())
    }

    /// Reactivates a suspended contract.
    pub fn reactivate(&mut self) -> Result<(), ContractError> {
        if !self.status.can_reactivate() {
            return Err(self.invalid("reactivate"));
        }
        self.transition(ContractStatus::Active);
        Ok(())
    }

    /// Marks the contract as expired.
    pub fn expire(&mut self) -> Result<(), ContractError> {
        if !self.status.can_expire() {
            return Err(self.invalid("expire"));
        }
        self.transition(ContractStatus::Expired);
        Ok(())
    }

    fn transition(&mut self, status: ContractStatus) {
        self.status = status;
        self.updated_at = Some(now());
    }

    fn invalid(&self, action: &'static str) -> ContractError {
        ContractError::InvalidStatusTransition {
            current_status: self.status,
            action,
        }
    }
}

// Query methods
impl Contract {
    /// Returns the contract ID.
    pub fn id(&self) -> ContractId {
        self.id
    }

    /// Returns the proposal this contract was issued for.
    pub fn proposal_id(&self) -> ProposalId {
        self.proposal_id
    }

    /// Returns the contract date.
    pub fn contract_date(&self) -> DateTime<Utc> {
        self.contract_date
    }

    /// Returns the current status.
    pub fn status(&self) -> ContractStatus {
        self.status
    }

    /// Returns when the contract was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the status last changed, if ever.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
