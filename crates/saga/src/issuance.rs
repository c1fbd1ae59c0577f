//! Contract-issuance saga steps: verify the proposal, create the contract,
//! publish the contract-created fact.

use std::sync::Arc;

use async_trait::async_trait;
use common::ProposalId;
use contract_store::ContractRepository;
use domain::{Contract, ProposalSnapshot};
use messaging::ContractEventPublisher;

use crate::error::{Result, SagaError};
use crate::services::ProposalQueryClient;
use crate::state::SagaState;
use crate::step::SagaStep;

/// The saga type identifier for contract issuance.
pub const SAGA_TYPE: &str = "ContractIssuance";

/// Step name: confirm the proposal exists and is approved.
pub const STEP_VERIFY_PROPOSAL: &str = "verify_proposal";

/// Step name: persist the new contract.
pub const STEP_CREATE_CONTRACT: &str = "create_contract";

/// Step name: publish the contract-created event.
pub const STEP_NOTIFY_CONTRACT_CREATED: &str = "notify_contract_created";

/// Data carried from one issuance step to the next.
#[derive(Debug, Clone)]
pub struct IssuanceContext {
    pub proposal_id: ProposalId,
    pub proposal: Option<ProposalSnapshot>,
    pub contract: Option<Contract>,
}

impl IssuanceContext {
    pub fn new(proposal_id: ProposalId) -> Self {
        Self {
            proposal_id,
            proposal: None,
            contract: None,
        }
    }

    fn contract(&self, step: &'static str) -> Result<&Contract> {
        self.contract.as_ref().ok_or(SagaError::MissingOutput {
            step,
            missing: "contract",
        })
    }
}

/// Fails unless the proposal exists and is approved. Nothing to compensate.
pub struct VerifyProposal {
    proposals: Arc<dyn ProposalQueryClient>,
}

impl VerifyProposal {
    pub fn new(proposals: Arc<dyn ProposalQueryClient>) -> Self {
        Self { proposals }
    }
}

#[async_trait]
impl SagaStep<IssuanceContext> for VerifyProposal {
    fn name(&self) -> &'static str {
        STEP_VERIFY_PROPOSAL
    }

    fn running_state(&self) -> SagaState {
        SagaState::Verifying
    }

    fn completed_state(&self) -> SagaState {
        SagaState::Verified
    }

    async fn execute(&self, ctx: &mut IssuanceContext) -> Result<()> {
        let proposal = self
            .proposals
            .get_proposal(ctx.proposal_id)
            .await?
            .ok_or(SagaError::ProposalNotFound(ctx.proposal_id))?;

        if !proposal.status.is_approved() {
            return Err(SagaError::ProposalNotApproved {
                proposal_id: ctx.proposal_id,
                status: proposal.status,
            });
        }

        ctx.proposal = Some(proposal);
        Ok(())
    }
}

/// Persists a new active contract. Compensated by cancelling it.
///
/// Uniqueness per proposal is left entirely to the repository: a lost race
/// surfaces as `ConstraintViolation` and, since nothing was created, leaves
/// nothing to compensate.
pub struct CreateContract {
    contracts: Arc<dyn ContractRepository>,
}

impl CreateContract {
    pub fn new(contracts: Arc<dyn ContractRepository>) -> Self {
        Self { contracts }
    }
}

#[async_trait]
impl SagaStep<IssuanceContext> for CreateContract {
    fn name(&self) -> &'static str {
        STEP_CREATE_CONTRACT
    }

    fn running_state(&self) -> SagaState {
        SagaState::Creating
    }

    fn completed_state(&self) -> SagaState {
        SagaState::Created
    }

    async fn execute(&self, ctx: &mut IssuanceContext) -> Result<()> {
        let contract = Contract::new(ctx.proposal_id);
        self.contracts.add(&contract).await?;

        tracing::info!(contract_id = %contract.id(), proposal_id = %ctx.proposal_id, "contract created");
        ctx.contract = Some(contract);
        Ok(())
    }

    fn has_compensation(&self) -> bool {
        true
    }

    async fn compensate(&self, ctx: &mut IssuanceContext) -> Result<()> {
        let contract = ctx.contract.as_mut().ok_or(SagaError::MissingOutput {
            step: STEP_CREATE_CONTRACT,
            missing: "contract",
        })?;

        contract.cancel()?;
        self.contracts.update(contract).await?;

        tracing::warn!(contract_id = %contract.id(), "contract cancelled by compensation");
        Ok(())
    }
}

/// Publishes the contract-created fact. Its own failure is what triggers
/// compensation, so it has nothing to undo.
pub struct NotifyContractCreated {
    events: ContractEventPublisher,
}

impl NotifyContractCreated {
    pub fn new(events: ContractEventPublisher) -> Self {
        Self { events }
    }
}

#[async_trait]
impl SagaStep<IssuanceContext> for NotifyContractCreated {
    fn name(&self) -> &'static str {
        STEP_NOTIFY_CONTRACT_CREATED
    }

    fn running_state(&self) -> SagaState {
        SagaState::Notifying
    }

    fn completed_state(&self) -> SagaState {
        SagaState::Completed
    }

    async fn execute(&self, ctx: &mut IssuanceContext) -> Result<()> {
        let event = ctx.contract(STEP_NOTIFY_CONTRACT_CREATED)?.created_event();
        self.events.publish_contract_created(&event).await?;

        tracing::info!(contract_id = %event.contract_id, "contract-created event published");
        Ok(())
    }
}
