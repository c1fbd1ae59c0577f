//! Saga coordinator for contract issuance.

use std::sync::Arc;

use common::ProposalId;
use contract_store::ContractRepository;
use domain::Contract;
use messaging::ContractEventPublisher;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SagaError};
use crate::instance::SagaInstance;
use crate::issuance::{
    CreateContract, IssuanceContext, NotifyContractCreated, SAGA_TYPE, STEP_CREATE_CONTRACT,
    VerifyProposal,
};
use crate::services::ProposalQueryClient;
use crate::step::SagaExecutor;

/// Outcome of one issuance: the saga record plus the contract or the error.
#[derive(Debug)]
pub struct IssuanceRun {
    pub saga: SagaInstance,
    pub result: Result<Contract>,
}

/// Orchestrates contract issuance.
///
/// Three steps run in strict order (verify → create → notify). If notify
/// fails after the contract was created, the contract is cancelled and the
/// notify error is returned.
pub struct ContractIssuanceSaga {
    executor: SagaExecutor<IssuanceContext>,
}

impl ContractIssuanceSaga {
    /// Creates a new saga coordinator.
    pub fn new(
        proposals: Arc<dyn ProposalQueryClient>,
        contracts: Arc<dyn ContractRepository>,
        events: ContractEventPublisher,
    ) -> Self {
        let executor = SagaExecutor::new(SAGA_TYPE)
            .step(VerifyProposal::new(proposals))
            .step(CreateContract::new(contracts))
            .step(NotifyContractCreated::new(events));

        Self { executor }
    }

    /// Issues a contract for an approved proposal.
    pub async fn issue_contract(
        &self,
        proposal_id: ProposalId,
        cancel: &CancellationToken,
    ) -> Result<Contract> {
        self.execute(proposal_id, cancel).await.result
    }

    /// Issues a contract and also returns the saga record.
    #[tracing::instrument(skip(self, cancel), fields(saga_type = SAGA_TYPE, %proposal_id))]
    pub async fn execute(&self, proposal_id: ProposalId, cancel: &CancellationToken) -> IssuanceRun {
        let mut ctx = IssuanceContext::new(proposal_id);
        let (saga, outcome) = self.executor.run(&mut ctx, cancel).await;

        let result = outcome.and_then(|()| {
            ctx.contract.ok_or(SagaError::MissingOutput {
                step: STEP_CREATE_CONTRACT,
                missing: "contract",
            })
        });

        IssuanceRun { saga, result }
    }

    /// Returns the step names in execution order.
    pub fn steps(&self) -> Vec<&'static str> {
        self.executor.step_names()
    }
}
