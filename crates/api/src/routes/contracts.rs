//! Contract issuance and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::ContractId;
use domain::Contract;
use saga::{GetContract, IssueContract, ListContracts};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueContractRequest {
    #[serde(default)]
    pub proposta_id: Option<Uuid>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractResponse {
    pub id: Uuid,
    pub proposta_id: Uuid,
    pub data_contratacao: DateTime<Utc>,
    pub status: String,
    pub data_criacao: DateTime<Utc>,
    pub data_atualizacao: Option<DateTime<Utc>>,
}

impl From<&Contract> for ContractResponse {
    fn from(contract: &Contract) -> Self {
        Self {
            id: contract.id().as_uuid(),
            proposta_id: contract.proposal_id().as_uuid(),
            data_contratacao: contract.contract_date(),
            status: contract.status().to_string(),
            data_criacao: contract.created_at(),
            data_atualizacao: contract.updated_at(),
        }
    }
}

// -- Handlers --

/// POST /api/contratos: issue a contract for an approved proposal.
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<IssueContractRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ContractResponse>), ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    // A missing id becomes nil so validation reports it with the other field errors.
    let command = IssueContract {
        proposal_id: req.proposta_id.unwrap_or_else(Uuid::nil),
    };

    let cancel = state.shutdown.child_token();
    let contract = state
        .pipeline
        .dispatch(&state.handler, command, &cancel)
        .await?;

    Ok((StatusCode::CREATED, Json(ContractResponse::from(&contract))))
}

/// GET /api/contratos/{id}: load one contract.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ContractResponse>, ApiError> {
    let id = parse_contract_id(&id)?;
    let contract = state
        .pipeline
        .dispatch(&state.handler, GetContract { id }, &state.shutdown.child_token())
        .await?;

    Ok(Json(ContractResponse::from(&contract)))
}

/// GET /api/contratos: list contracts, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContractResponse>>, ApiError> {
    let contracts = state
        .pipeline
        .dispatch(&state.handler, ListContracts, &state.shutdown.child_token())
        .await?;

    Ok(Json(contracts.iter().map(ContractResponse::from).collect()))
}

fn parse_contract_id(s: &str) -> Result<ContractId, ApiError> {
    let uuid =
        Uuid::parse_str(s).map_err(|e| ApiError::BadRequest(format!("Invalid contract ID: {e}")))?;
    Ok(ContractId::from_uuid(uuid))
}
