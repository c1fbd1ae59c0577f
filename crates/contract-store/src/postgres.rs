use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ContractId, ProposalId};
use domain::{Contract, ContractStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{ContractRepository, Result, StoreError};

/// Name of the unique constraint on `contracts.proposal_id`.
pub const UNIQUE_PROPOSAL_CONSTRAINT: &str = "uq_contracts_proposal_id";

const SELECT_CONTRACT: &str =
    "SELECT id, proposal_id, contract_date, status, created_at, updated_at FROM contracts";

/// PostgreSQL-backed contract repository.
///
/// Each write runs in its own transaction and is committed before returning.
#[derive(Clone)]
pub struct PostgresContractRepository {
    pool: PgPool,
}

impl PostgresContractRepository {
    /// Creates a new PostgreSQL contract repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_contract(row: PgRow) -> Result<Contract> {
        let proposal_id = ProposalId::from_uuid(row.try_get::<Uuid, _>("proposal_id")?)
            .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;
        let status = row
            .try_get::<String, _>("status")?
            .parse::<ContractStatus>()
            .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;

        Ok(Contract::restore(
            ContractId::from_uuid(row.try_get::<Uuid, _>("id")?),
            proposal_id,
            row.try_get::<DateTime<Utc>, _>("contract_date")?,
            status,
            row.try_get::<DateTime<Utc>, _>("created_at")?,
            row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
        ))
    }
}

#[async_trait]
impl ContractRepository for PostgresContractRepository {
    async fn get_by_id(&self, id: ContractId) -> Result<Option<Contract>> {
        let row = sqlx::query(&format!("{SELECT_CONTRACT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_contract).transpose()
    }

    async fn get_by_proposal_id(&self, proposal_id: ProposalId) -> Result<Option<Contract>> {
        let row = sqlx::query(&format!("{SELECT_CONTRACT} WHERE proposal_id = $1"))
            .bind(proposal_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_contract).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Contract>> {
        let rows = sqlx::query(&format!("{SELECT_CONTRACT} ORDER BY created_at DESC"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_contract).collect()
    }

    async fn add(&self, contract: &Contract) -> Result<()> {
        let proposal_id = contract.proposal_id();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO contracts (id, proposal_id, contract_date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(contract.id().as_uuid())
        .bind(proposal_id.as_uuid())
        .bind(contract.contract_date())
        .bind(contract.status().as_str())
        .bind(contract.created_at())
        .bind(contract.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(UNIQUE_PROPOSAL_CONSTRAINT)
            {
                return StoreError::ConstraintViolation { proposal_id };
            }
            StoreError::Database(e)
        })?;

        tx.commit().await?;
        tracing::debug!(contract_id = %contract.id(), %proposal_id, "contract inserted");
        Ok(())
    }

    async fn update(&self, contract: &Contract) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE contracts
            SET status = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(contract.id().as_uuid())
        .bind(contract.status().as_str())
        .bind(contract.updated_at())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(contract.id()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn exists_for_proposal(&self, proposal_id: ProposalId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM contracts WHERE proposal_id = $1)")
                .bind(proposal_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}

