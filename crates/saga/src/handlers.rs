//! Commands and queries served through the command pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use common::{ContractId, ProposalId};
use contract_store::ContractRepository;
use domain::{Command, CommandHandler, CommandKind, Contract, ProposalSnapshot, ValidationErrors};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::coordinator::ContractIssuanceSaga;
use crate::error::SagaError;
use crate::services::ProposalQueryClient;

/// Issue a contract for a proposal.
#[derive(Debug, Clone)]
pub struct IssueContract {
    pub proposal_id: Uuid,
}

impl Command for IssueContract {
    type Output = Contract;

    fn name(&self) -> &'static str {
        "IssueContract"
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.proposal_id.is_nil() {
            errors.add("propostaId", "is required");
        }
        errors.into_result()
    }
}

/// Load one contract.
#[derive(Debug, Clone)]
pub struct GetContract {
    pub id: ContractId,
}

impl Command for GetContract {
    type Output = Contract;

    fn name(&self) -> &'static str {
        "GetContract"
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Query
    }
}

/// List all contracts, newest first.
#[derive(Debug, Clone, Default)]
pub struct ListContracts;

impl Command for ListContracts {
    type Output = Vec<Contract>;

    fn name(&self) -> &'static str {
        "ListContracts"
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Query
    }
}

/// Look up a proposal at the proposal service.
#[derive(Debug, Clone)]
pub struct GetProposal {
    pub proposal_id: ProposalId,
}

impl Command for GetProposal {
    type Output = Option<ProposalSnapshot>;

    fn name(&self) -> &'static str {
        "GetProposal"
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Query
    }
}

/// Serves contract commands and queries.
#[derive(Clone)]
pub struct ContractHandler {
    saga: Arc<ContractIssuanceSaga>,
    contracts: Arc<dyn ContractRepository>,
    proposals: Arc<dyn ProposalQueryClient>,
}

impl ContractHandler {
    pub fn new(
        saga: Arc<ContractIssuanceSaga>,
        contracts: Arc<dyn ContractRepository>,
        proposals: Arc<dyn ProposalQueryClient>,
    ) -> Self {
        Self {
            saga,
            contracts,
            proposals,
        }
    }
}

#[async_trait]
impl CommandHandler<IssueContract> for ContractHandler {
    type Error = SagaError;

    #[tracing::instrument(skip(self, cancel), fields(proposal_id = %command.proposal_id))]
    async fn handle(
        &self,
        command: IssueContract,
        cancel: &CancellationToken,
    ) -> Result<Contract, SagaError> {
        let proposal_id = ProposalId::from_uuid(command.proposal_id).map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add("propostaId", e.to_string());
            SagaError::Validation(errors)
        })?;

        // Fast path for the common duplicate; concurrent duplicates are
        // caught by the storage constraint inside the saga.
        if self.contracts.exists_for_proposal(proposal_id).await? {
            return Err(SagaError::AlreadyContracted(proposal_id));
        }

        self.saga.issue_contract(proposal_id, cancel).await
    }
}

#[async_trait]
impl CommandHandler<GetContract> for ContractHandler {
    type Error = SagaError;

    async fn handle(&self, query: GetContract, _: &CancellationToken) -> Result<Contract, SagaError> {
        self.contracts
            .get_by_id(query.id)
            .await?
            .ok_or(SagaError::ContractNotFound(query.id))
    }
}

#[async_trait]
impl CommandHandler<ListContracts> for ContractHandler {
    type Error = SagaError;

    async fn handle(&self, _: ListContracts, _: &CancellationToken) -> Result<Vec<Contract>, SagaError> {
        Ok(self.contracts.list_all().await?)
    }
}

#[async_trait]
impl CommandHandler<GetProposal> for ContractHandler {
    type Error = SagaError;

    async fn handle(
        &self,
        query: GetProposal,
        _: &CancellationToken,
    ) -> Result<Option<ProposalSnapshot>, SagaError> {
        Ok(self.proposals.get_proposal(query.proposal_id).await?)
    }
}
