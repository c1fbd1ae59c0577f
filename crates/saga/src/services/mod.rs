//! External services consulted by saga steps.

pub mod proposal;

pub use proposal::{
    DEFAULT_TIMEOUT, HttpProposalClient, InMemoryProposalClient, ProposalClientError,
    ProposalQueryClient,
};
