//! Domain layer for contract issuance.
//!
//! This crate provides:
//! - the `Contract` aggregate with its status state machine
//! - the `ContractCreated` domain event
//! - the read-only `ProposalSnapshot` owned by the proposal service
//! - field validation and the validate → execute command pipeline

pub mod command;
pub mod contract;
pub mod error;
pub mod event;
pub mod proposal;

pub use command::{Command, CommandHandler, CommandKind, CommandPipeline};
pub use contract::{Contract, ContractCreated, ContractError, ContractStatus};
pub use error::{FieldError, ValidationErrors};
pub use event::DomainEvent;
pub use proposal::{ProposalSnapshot, ProposalStatus};
