//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency and are
//! serialized because each one truncates the table. Run with:
//!
//! ```bash
//! cargo test -p contract-store --test postgres_integration
//! ```

use std::sync::Arc;

use common::{ContractId, ProposalId};
use contract_store::{ContractRepository, PostgresContractRepository, StoreError};
use domain::{Contract, ContractStatus};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_contracts_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh repository with its own pool and an empty table
async fn get_test_repository() -> PostgresContractRepository {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE contracts")
        .execute(&pool)
        .await
        .unwrap();

    PostgresContractRepository::new(pool)
}

#[tokio::test]
#[serial]
async fn add_and_load_contract() {
    let repo = get_test_repository().await;
    let contract = Contract::new(ProposalId::new());

    repo.add(&contract).await.unwrap();

    let by_id = repo.get_by_id(contract.id()).await.unwrap().unwrap();
    assert_eq!(by_id, contract);

    let by_proposal = repo
        .get_by_proposal_id(contract.proposal_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_proposal.id(), contract.id());
    assert_eq!(by_proposal.status(), ContractStatus::Active);
    assert!(by_proposal.updated_at().is_none());
}

#[tokio::test]
#[serial]
async fn missing_contract_returns_none() {
    let repo = get_test_repository().await;

    assert!(repo.get_by_id(ContractId::new()).await.unwrap().is_none());
    assert!(
        repo.get_by_proposal_id(ProposalId::new())
            .await
            .unwrap()
            .is_none()
    );
    assert!(!repo.exists_for_proposal(ProposalId::new()).await.unwrap());
}

#[tokio::test]
#[serial]
async fn unique_constraint_rejects_second_contract() {
    let repo = get_test_repository().await;
    let proposal_id = ProposalId::new();
    let first = Contract::new(proposal_id);

    repo.add(&first).await.unwrap();
    assert!(repo.exists_for_proposal(proposal_id).await.unwrap());

    let err = repo.add(&Contract::new(proposal_id)).await.unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation { proposal_id: p } if p == proposal_id));

    let stored = repo.get_by_proposal_id(proposal_id).await.unwrap().unwrap();
    assert_eq!(stored.id(), first.id());
}

#[tokio::test]
#[serial]
async fn concurrent_adds_have_single_winner() {
    let repo = get_test_repository().await;
    let proposal_id = ProposalId::new();

    let attempts = (0..8).map(|_| {
        let repo = repo.clone();
        async move { repo.add(&Contract::new(proposal_id)).await }
    });
    let results = futures_util::future::join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let violations = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::ConstraintViolation { .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(violations, 7);
    assert_eq!(repo.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn update_persists_status_change() {
    let repo = get_test_repository().await;
    let mut contract = Contract::new(ProposalId::new());
    repo.add(&contract).await.unwrap();

    contract.cancel().unwrap();
    repo.update(&contract).await.unwrap();

    let stored = repo.get_by_id(contract.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), ContractStatus::Cancelled);
    assert_eq!(stored.updated_at(), contract.updated_at());
    assert_eq!(stored.proposal_id(), contract.proposal_id());
}

#[tokio::test]
#[serial]
async fn update_missing_contract_is_not_found() {
    let repo = get_test_repository().await;
    let contract = Contract::new(ProposalId::new());

    let err = repo.update(&contract).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == contract.id()));
}

#[tokio::test]
#[serial]
async fn list_all_returns_newest_first() {
    let repo = get_test_repository().await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let contract = Contract::new(ProposalId::new());
        repo.add(&contract).await.unwrap();
        ids.push(contract.id());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let listed: Vec<ContractId> = repo
        .list_all()
        .await
        .unwrap()
        .iter()
        .map(Contract::id)
        .collect();
    ids.reverse();
    assert_eq!(listed, ids);
}
