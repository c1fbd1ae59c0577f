//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::listener::ContractCreatedListener;
use contract_store::{InMemoryContractRepository, PostgresContractRepository};
use messaging::{
    AmqpConsumer, AmqpPublisher, BrokerConnection, InMemoryBroker, MessageConsumer,
    MessagePublisher, Topology,
};
use saga::{HttpProposalClient, ProposalQueryClient};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Connects the broker named by `AMQP_URL`, or starts an in-memory one.
async fn connect_broker(
    config: &Config,
    topology: &Topology,
) -> Result<(Arc<dyn MessagePublisher>, Arc<dyn MessageConsumer>), BoxError> {
    match &config.amqp_url {
        Some(url) => {
            let connection = BrokerConnection::connect(url).await?;
            connection.declare_topology(topology).await?;
            tracing::info!(exchange = %topology.exchange, "connected to AMQP broker");
            Ok((
                Arc::new(AmqpPublisher::new(connection.clone())),
                Arc::new(AmqpConsumer::new(connection, "contract-api")),
            ))
        }
        None => {
            let broker = InMemoryBroker::new();
            broker.declare_topology(topology).await?;
            tracing::warn!("AMQP_URL not set, using in-memory broker");
            Ok((Arc::new(broker.clone()), Arc::new(broker)))
        }
    }
}

fn spawn_listener(
    config: &Config,
    consumer: Arc<dyn MessageConsumer>,
    shutdown: &CancellationToken,
) -> Option<JoinHandle<()>> {
    if !config.consume_contract_events {
        return None;
    }

    let queue = config.contract_created_queue.clone();
    let cancel = shutdown.child_token();
    Some(tokio::spawn(async move {
        tracing::info!(%queue, "starting contract-created listener");
        if let Err(e) = consumer
            .start_consuming(&queue, Arc::new(ContractCreatedListener), cancel)
            .await
        {
            tracing::error!(%queue, error = %e, "contract-created listener stopped");
        }
    }))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("failed to install Prometheus recorder: {e}"))?;

    // 3. Connect collaborators
    let proposals: Arc<dyn ProposalQueryClient> = Arc::new(HttpProposalClient::new(
        config.proposal_service_url.as_str(),
        config.proposal_service_timeout,
    )?);

    let topology = Topology::contracts(
        config.contracts_exchange.as_str(),
        config.contract_created_queue.as_str(),
    );
    let (publisher, consumer) = connect_broker(&config, &topology).await?;

    let shutdown = CancellationToken::new();
    let state = match &config.database_url {
        Some(url) => {
            let repository = PostgresContractRepository::connect(url, 10).await?;
            repository.run_migrations().await?;
            tracing::info!("connected to PostgreSQL, migrations applied");
            api::create_state(
                proposals,
                Arc::new(repository),
                publisher,
                &config.contracts_exchange,
                shutdown.clone(),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping contracts in memory");
            api::create_state(
                proposals,
                Arc::new(InMemoryContractRepository::new()),
                publisher,
                &config.contracts_exchange,
                shutdown.clone(),
            )
        }
    };

    // 4. Start the optional listener and build the application
    let listener_task = spawn_listener(&config, consumer, &shutdown);
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight requests have drained; stop the listener.
    shutdown.cancel();
    if let Some(task) = listener_task
        && let Err(e) = task.await
    {
        tracing::error!(error = %e, "listener task panicked");
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
