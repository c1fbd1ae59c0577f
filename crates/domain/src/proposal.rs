//! Read-only view of a proposal owned by the proposal service.

use chrono::{DateTime, NaiveDateTime, Utc};
use common::ProposalId;
use serde::{Deserialize, Deserializer, Serialize};

/// Approval state of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StatusRepr")]
pub enum ProposalStatus {
    UnderReview,
    Approved,
    Rejected,
}

impl ProposalStatus {
    /// Returns true if a contract may be issued against the proposal.
    pub fn is_approved(&self) -> bool {
        matches!(self, ProposalStatus::Approved)
    }

    /// Returns the status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::UnderReview => "UnderReview",
            ProposalStatus::Approved => "Approved",
            ProposalStatus::Rejected => "Rejected",
        }
    }

    /// Parses a status name, ignoring case and separators.
    ///
    /// Both the English names and the proposal service's own names
    /// (`EmAnalise`, `Aprovada`, `Rejeitada`) are understood.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "underreview" | "emanalise" => Some(ProposalStatus::UnderReview),
            "approved" | "aprovada" => Some(ProposalStatus::Approved),
            "rejected" | "rejeitada" => Some(ProposalStatus::Rejected),
            _ => None,
        }
    }

    /// Maps the proposal service's numeric enum encoding.
    pub fn from_ordinal(ordinal: u64) -> Option<Self> {
        match ordinal {
            0 => Some(ProposalStatus::UnderReview),
            1 => Some(ProposalStatus::Approved),
            2 => Some(ProposalStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Name(String),
    Ordinal(u64),
}

impl TryFrom<StatusRepr> for ProposalStatus {
    type Error = String;

    fn try_from(repr: StatusRepr) -> Result<Self, Self::Error> {
        match repr {
            StatusRepr::Name(name) => {
                ProposalStatus::parse(&name).ok_or_else(|| format!("unknown proposal status '{name}'"))
            }
            StatusRepr::Ordinal(n) => {
                ProposalStatus::from_ordinal(n).ok_or_else(|| format!("unknown proposal status {n}"))
            }
        }
    }
}

/// Snapshot of a proposal as returned by the proposal service.
///
/// Only `id` and `status` drive issuance; the remaining fields are carried
/// for logging and display. Monetary amounts are informational and never
/// used in arithmetic here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProposalSnapshot {
    #[serde(rename = "id")]
    pub id: ProposalId,

    #[serde(rename = "nomecliente", default)]
    pub customer_name: String,

    #[serde(rename = "cpf", default)]
    pub cpf: String,

    #[serde(rename = "tiposeguro", default)]
    pub insurance_type: String,

    #[serde(rename = "valorcobertura", default)]
    pub coverage_amount: f64,

    #[serde(rename = "valorpremio", default)]
    pub premium_amount: f64,

    #[serde(rename = "datacriacao", default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(rename = "status")]
    pub status: ProposalStatus,
}

impl ProposalSnapshot {
    /// Creates a minimal snapshot, mostly useful for in-memory clients.
    pub fn new(id: ProposalId, status: ProposalStatus) -> Self {
        Self {
            id,
            customer_name: String::new(),
            cpf: String::new(),
            insurance_type: String::new(),
            coverage_amount: 0.0,
            premium_amount: 0.0,
            created_at: None,
            status,
        }
    }

    /// Parses a proposal-service response body.
    ///
    /// Top-level field names are matched case-insensitively and unknown
    /// fields are ignored, so `NomeCliente`, `nomeCliente` and `nomecliente`
    /// all land in the same place.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        let normalized = match value {
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key.to_ascii_lowercase(), value))
                    .collect(),
            ),
            other => other,
        };
        serde_json::from_value(normalized)
    }
}

/// Accepts RFC 3339 timestamps as well as offset-less ones, read as UTC.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}
