//! Contract domain events.

use chrono::{DateTime, Utc};
use common::{ContractId, ProposalId};
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

/// A contract was created for a proposal.
///
/// The fact outlives the contract it describes: compensating a failed
/// issuance cancels the contract but does not retract this event.
///
/// On the wire the field names follow the proposal-service family
/// (`ContratoId`, `PropostaId`, `DataContratacao`); camel and snake case
/// spellings are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCreated {
    #[serde(
        rename = "ContratoId",
        alias = "contratoId",
        alias = "contratoid",
        alias = "contractId",
        alias = "contract_id"
    )]
    pub contract_id: ContractId,

    #[serde(
        rename = "PropostaId",
        alias = "propostaId",
        alias = "propostaid",
        alias = "proposalId",
        alias = "proposal_id"
    )]
    pub proposal_id: ProposalId,

    #[serde(
        rename = "DataContratacao",
        alias = "dataContratacao",
        alias = "datacontratacao",
        alias = "contractDate",
        alias = "contract_date"
    )]
    pub contract_date: DateTime<Utc>,
}

impl DomainEvent for ContractCreated {
    fn event_type(&self) -> &'static str {
        "ContractCreated"
    }
}
