//! Contract persistence.
//!
//! The repository is the invariant guard for "at most one contract per
//! proposal". Implementations must reject a second contract for the same
//! proposal atomically at the storage layer and report it as
//! [`StoreError::ConstraintViolation`]; `exists_for_proposal` is only a
//! fast-fail shortcut and gives no guarantee under concurrency.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryContractRepository;
pub use postgres::{PostgresContractRepository, UNIQUE_PROPOSAL_CONSTRAINT};
pub use store::ContractRepository;
