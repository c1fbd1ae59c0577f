//! Integration tests for the Contract aggregate.
//!
//! These tests walk a contract through its status machine and check the
//! contract-created fact as it travels over the wire.

use common::ProposalId;
use domain::{Contract, ContractCreated, ContractError, ContractStatus, DomainEvent};

mod contract_lifecycle {
    use super::*;

    #[test]
    fn suspend_reactivate_expire_cancel() {
        let mut contract = Contract::new(ProposalId::new());

        contract.suspend().unwrap();
        assert_eq!(contract.status(), ContractStatus::Suspended);

        contract.reactivate().unwrap();
        assert_eq!(contract.status(), ContractStatus::Active);

        contract.expire().unwrap();
        assert_eq!(contract.status(), ContractStatus::Expired);

        // An expired contract can still be cancelled, once.
        contract.cancel().unwrap();
        assert_eq!(contract.status(), ContractStatus::Cancelled);
        assert_eq!(contract.cancel(), Err(ContractError::AlreadyCancelled));
    }

    #[test]
    fn cancelled_is_terminal() {
        let mut contract = Contract::new(ProposalId::new());
        contract.cancel().unwrap();

        assert!(contract.suspend().is_err());
        assert!(contract.reactivate().is_err());
        assert!(contract.expire().is_err());
        assert_eq!(contract.status(), ContractStatus::Cancelled);
    }

    #[test]
    fn restore_preserves_every_field() {
        let mut original = Contract::new(ProposalId::new());
        original.suspend().unwrap();

        let restored = Contract::restore(
            original.id(),
            original.proposal_id(),
            original.contract_date(),
            original.status(),
            original.created_at(),
            original.updated_at(),
        );

        assert_eq!(restored, original);
    }
}

mod contract_created_wire_format {
    use super::*;

    #[test]
    fn created_fact_survives_json() {
        let contract = Contract::new(ProposalId::new());
        let event = contract.created_event();

        let json = serde_json::to_string(&event).unwrap();
        let decoded: ContractCreated = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.contract_id, contract.id());
        assert_eq!(decoded.proposal_id, contract.proposal_id());
        assert_eq!(decoded.contract_date, contract.contract_date());
        assert_eq!(decoded.event_type(), event.event_type());
    }

    #[test]
    fn nil_proposal_reference_is_refused() {
        let json = serde_json::json!({
            "ContratoId": uuid::Uuid::new_v4(),
            "PropostaId": uuid::Uuid::nil(),
            "DataContratacao": "2024-05-01T12:00:00Z"
        });

        assert!(serde_json::from_value::<ContractCreated>(json).is_err());
    }
}
