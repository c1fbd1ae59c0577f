use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a contract.
///
/// Generated locally when a contract is created; never supplied by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(Uuid);

impl ContractId {
    /// Creates a new random contract ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a contract ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContractId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ContractId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ContractId> for Uuid {
    fn from(id: ContractId) -> Self {
        id.0
    }
}

/// Error returned when a proposal reference is the nil UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("proposal id must not be empty")]
pub struct InvalidProposalId;

/// Reference to a proposal owned by the proposal service.
///
/// A proposal ID is never nil: construction and deserialization both
/// reject `00000000-0000-0000-0000-000000000000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Uuid", into = "Uuid")]
pub struct ProposalId(Uuid);

impl ProposalId {
    /// Creates a new random proposal ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a proposal ID from an existing UUID, rejecting the nil UUID.
    pub fn from_uuid(uuid: Uuid) -> Result<Self, InvalidProposalId> {
        if uuid.is_nil() {
            return Err(InvalidProposalId);
        }
        Ok(Self(uuid))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Uuid> for ProposalId {
    type Error = InvalidProposalId;

    fn try_from(uuid: Uuid) -> Result<Self, Self::Error> {
        Self::from_uuid(uuid)
    }
}

impl From<ProposalId> for Uuid {
    fn from(id: ProposalId) -> Self {
        id.0
    }
}
