//! HTTP API server with observability for contract issuance.
//!
//! Provides REST endpoints that issue and look up contracts through the
//! command pipeline, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod listener;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use contract_store::ContractRepository;
use domain::CommandPipeline;
use messaging::{ContractEventPublisher, MessagePublisher};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{ContractHandler, ContractIssuanceSaga, ProposalQueryClient};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub pipeline: CommandPipeline,
    pub handler: ContractHandler,
    /// Cancelled once the server has drained; every request runs under a child token.
    pub shutdown: CancellationToken,
}

/// Wires the saga, the handler and the pipeline around the given collaborators.
pub fn create_state<R>(
    proposals: Arc<dyn ProposalQueryClient>,
    contracts: Arc<R>,
    publisher: Arc<dyn MessagePublisher>,
    exchange: &str,
    shutdown: CancellationToken,
) -> Arc<AppState>
where
    R: ContractRepository + 'static,
{
    let events = ContractEventPublisher::new(publisher, exchange);
    let saga = Arc::new(ContractIssuanceSaga::new(
        Arc::clone(&proposals),
        contracts.clone(),
        events,
    ));

    Arc::new(AppState {
        pipeline: CommandPipeline::new(),
        handler: ContractHandler::new(saga, contracts, proposals),
        shutdown,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/api/contratos",
            get(routes::contracts::list).post(routes::contracts::create),
        )
        .route("/api/contratos/{id}", get(routes::contracts::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
