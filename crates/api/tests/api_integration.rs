//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::ProposalId;
use contract_store::InMemoryContractRepository;
use domain::ProposalStatus;
use async_trait::async_trait;
use contract_store::ContractRepository;
use domain::ContractStatus;
use messaging::{
    CONTRACT_CREATED_QUEUE, CONTRACTS_EXCHANGE, InMemoryBroker, MessagePublisher,
    OutgoingMessage, Topology,
};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::InMemoryProposalClient;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    proposals: InMemoryProposalClient,
    contracts: InMemoryContractRepository,
    broker: InMemoryBroker,
}

async fn setup() -> TestApp {
    let proposals = InMemoryProposalClient::new();
    let contracts = InMemoryContractRepository::new();
    let broker = InMemoryBroker::new();
    broker.declare_topology(&Topology::default()).await.unwrap();

    let state = api::create_state(
        Arc::new(proposals.clone()),
        Arc::new(contracts.clone()),
        Arc::new(broker.clone()),
        CONTRACTS_EXCHANGE,
        CancellationToken::new(),
    );
    let app = api::create_app(state, get_metrics_handle());

    TestApp {
        app,
        proposals,
        contracts,
        broker,
    }
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn post_contract(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/contratos")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let t = setup().await;

    let (status, json) = send(&t.app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_issue_contract_for_approved_proposal() {
    let t = setup().await;
    let proposal_id = ProposalId::new();
    t.proposals.insert(proposal_id, ProposalStatus::Approved);

    let (status, json) = send(
        &t.app,
        post_contract(serde_json::json!({ "propostaId": proposal_id })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["propostaId"], proposal_id.to_string());
    assert_eq!(json["status"], "Active");
    assert!(json["id"].as_str().is_some());
    assert!(json["dataContratacao"].as_str().is_some());
    assert!(json["dataAtualizacao"].is_null());
    assert_eq!(t.broker.queue_len(CONTRACT_CREATED_QUEUE).await, 1);
}

#[tokio::test]
async fn test_issue_then_get_and_list() {
    let t = setup().await;
    let proposal_id = ProposalId::new();
    t.proposals.insert(proposal_id, ProposalStatus::Approved);

    let (_, created) = send(
        &t.app,
        post_contract(serde_json::json!({ "propostaId": proposal_id })),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&t.app, get(&format!("/api/contratos/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id);
    assert_eq!(fetched["propostaId"], proposal_id.to_string());

    let (status, list) = send(&t.app, get("/api/contratos")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], id);
}

#[tokio::test]
async fn test_missing_proposal_id_is_a_validation_error() {
    let t = setup().await;

    let (status, json) = send(&t.app, post_contract(serde_json::json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("propostaId"));
    assert_eq!(t.proposals.lookup_count(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let t = setup().await;

    let (status, json) = send(
        &t.app,
        post_contract(serde_json::json!({ "propostaId": "not-a-uuid" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_unapproved_proposal_is_rejected() {
    let t = setup().await;
    let proposal_id = ProposalId::new();
    t.proposals.insert(proposal_id, ProposalStatus::UnderReview);

    let (status, json) = send(
        &t.app,
        post_contract(serde_json::json!({ "propostaId": proposal_id })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("not approved"));
    assert_eq!(t.contracts.contract_count().await, 0);
    assert_eq!(t.broker.published_count().await, 0);
}

#[tokio::test]
async fn test_unknown_proposal_is_not_found() {
    let t = setup().await;

    let (status, _) = send(
        &t.app,
        post_contract(serde_json::json!({ "propostaId": ProposalId::new() })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_second_issue_for_same_proposal_conflicts() {
    let t = setup().await;
    let proposal_id = ProposalId::new();
    t.proposals.insert(proposal_id, ProposalStatus::Approved);
    let body = serde_json::json!({ "propostaId": proposal_id });

    let (first, _) = send(&t.app, post_contract(body.clone())).await;
    let (second, _) = send(&t.app, post_contract(body)).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(t.contracts.contract_count().await, 1);
}

#[tokio::test]
async fn test_broker_failure_is_generic_server_error() {
    let t = setup().await;
    let proposal_id = ProposalId::new();
    t.proposals.insert(proposal_id, ProposalStatus::Approved);
    t.broker.set_unreachable(true);

    let (status, json) = send(
        &t.app,
        post_contract(serde_json::json!({ "propostaId": proposal_id })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to process the request");

    let (_, list) = send(&t.app, get("/api/contratos")).await;
    assert_eq!(list[0]["status"], "Cancelled");
    assert!(list[0]["dataAtualizacao"].as_str().is_some());
}

#[tokio::test]
async fn test_get_unknown_contract() {
    let t = setup().await;

    let (status, _) = send(
        &t.app,
        get(&format!("/api/contratos/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, get("/api/contratos/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup().await;

    let response = t.app.clone().oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_health_reports_shutdown() {
    let shutdown = CancellationToken::new();
    let state = api::create_state(
        Arc::new(InMemoryProposalClient::new()),
        Arc::new(InMemoryContractRepository::new()),
        Arc::new(InMemoryBroker::new()),
        CONTRACTS_EXCHANGE,
        shutdown.clone(),
    );
    let app = api::create_app(state, get_metrics_handle());
    shutdown.cancel();

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "shutting_down");
}

/// Holds every publish for a while before handing it to the broker.
struct SlowPublisher {
    broker: InMemoryBroker,
    delay: Duration,
}

#[async_trait]
impl MessagePublisher for SlowPublisher {
    async fn publish(&self, message: OutgoingMessage) -> messaging::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.broker.publish(message).await
    }
}

#[tokio::test]
async fn test_shutdown_does_not_strand_issuance_in_flight() {
    let proposals = InMemoryProposalClient::new();
    let contracts = InMemoryContractRepository::new();
    let broker = InMemoryBroker::new();
    broker.declare_topology(&Topology::default()).await.unwrap();
    let shutdown = CancellationToken::new();

    let state = api::create_state(
        Arc::new(proposals.clone()),
        Arc::new(contracts.clone()),
        Arc::new(SlowPublisher {
            broker: broker.clone(),
            delay: Duration::from_millis(200),
        }),
        CONTRACTS_EXCHANGE,
        shutdown.clone(),
    );
    let app = api::create_app(state, get_metrics_handle());

    let proposal_id = ProposalId::new();
    proposals.insert(proposal_id, ProposalStatus::Approved);

    let request = tokio::spawn(async move {
        send(
            &app,
            post_contract(serde_json::json!({ "propostaId": proposal_id })),
        )
        .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    let (status, json) = request.await.unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "Active");
    let stored = contracts
        .get_by_proposal_id(proposal_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status(), ContractStatus::Active);
    assert_eq!(broker.queue_len(CONTRACT_CREATED_QUEUE).await, 1);
}
