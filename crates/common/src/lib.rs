//! Shared identifier types used across the contract issuance crates.

pub mod types;

pub use types::{ContractId, InvalidProposalId, ProposalId};
