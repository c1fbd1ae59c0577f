//! RabbitMQ integration tests
//!
//! These tests start a RabbitMQ container once and share it. Each test
//! declares its own uniquely named queues so tests can run in parallel.
//!
//! ```bash
//! cargo test -p messaging --test amqp_integration
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::ProposalId;
use domain::{Contract, ContractCreated};
use messaging::{
    AmqpConsumer, AmqpPublisher, BrokerConnection, ContractEventPublisher, Delivery, Disposition,
    HandlerError, MessageConsumer, MessageHandler, MessagePublisherExt, Topology, decode_json,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::rabbitmq::RabbitMq;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<RabbitMq>,
    uri: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = RabbitMq::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5672).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                uri: format!("amqp://guest:guest@{}:{}/%2f", host, port),
            })
        })
        .await
        .clone()
}

/// Connects and declares a topology whose names are unique to the calling test.
async fn setup(test: &str) -> (BrokerConnection, Topology) {
    let info = get_container_info().await;
    let connection = BrokerConnection::connect(&info.uri).await.unwrap();

    let topology = Topology::contracts(
        format!("{test}.contratos.exchange"),
        format!("{test}.contrato.criado.queue"),
    );
    connection.declare_topology(&topology).await.unwrap();

    (connection, topology)
}

#[derive(Default)]
struct RecordingHandler {
    received: tokio::sync::Mutex<Vec<ContractCreated>>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        let event: ContractCreated = decode_json(delivery)?;
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(HandlerError::Failed("not yet".into()));
        }
        self.received.lock().await.push(event);
        Ok(())
    }
}

#[tokio::test]
async fn declare_topology_twice_is_idempotent() {
    let (connection, topology) = setup("idempotent").await;
    connection.declare_topology(&topology).await.unwrap();
}

#[tokio::test]
async fn published_event_reaches_bound_queue() {
    let (connection, topology) = setup("publish").await;
    let publisher = ContractEventPublisher::new(
        Arc::new(AmqpPublisher::new(connection.clone())),
        topology.exchange.clone(),
    );
    let consumer = AmqpConsumer::new(connection, "publish-test");
    let queue = &topology.bindings[0].queue;

    let event = Contract::new(ProposalId::new()).created_event();
    publisher.publish_contract_created(&event).await.unwrap();

    let handler = RecordingHandler::default();
    let disposition = consumer.consume_one(queue, &handler).await.unwrap();

    assert_eq!(disposition, Some(Disposition::Acked));
    let received = handler.received.lock().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].contract_id, event.contract_id);
    drop(received);

    assert_eq!(consumer.consume_one(queue, &handler).await.unwrap(), None);
}

#[tokio::test]
async fn delivery_is_persistent_json() {
    let (connection, topology) = setup("properties").await;
    let publisher = AmqpPublisher::new(connection.clone());
    let consumer = AmqpConsumer::new(connection, "properties-test");

    publisher
        .publish_json(&topology.exchange, "contrato.criado", &serde_json::json!({"x": 1}))
        .await
        .unwrap();

    struct Inspect(tokio::sync::Mutex<Option<Delivery>>);

    #[async_trait]
    impl MessageHandler for Inspect {
        async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
            *self.0.lock().await = Some(delivery.clone());
            Ok(())
        }
    }

    let inspect = Inspect(tokio::sync::Mutex::new(None));
    consumer
        .consume_one(&topology.bindings[0].queue, &inspect)
        .await
        .unwrap();

    let delivery = inspect.0.lock().await.clone().unwrap();
    assert!(delivery.persistent);
    assert_eq!(delivery.content_type.as_deref(), Some("application/json"));
    assert_eq!(delivery.routing_key, "contrato.criado");
}

#[tokio::test]
async fn failed_handler_requeues_message() {
    let (connection, topology) = setup("requeue").await;
    let publisher = ContractEventPublisher::new(
        Arc::new(AmqpPublisher::new(connection.clone())),
        topology.exchange.clone(),
    );
    let consumer = AmqpConsumer::new(connection, "requeue-test");
    let queue = &topology.bindings[0].queue;

    publisher
        .publish_contract_created(&Contract::new(ProposalId::new()).created_event())
        .await
        .unwrap();

    let handler = RecordingHandler {
        failures_left: AtomicUsize::new(1),
        ..Default::default()
    };

    let first = consumer.consume_one(queue, &handler).await.unwrap();
    assert_eq!(first, Some(Disposition::Requeued));

    let second = consumer.consume_one(queue, &handler).await.unwrap();
    assert_eq!(second, Some(Disposition::Acked));
    assert_eq!(handler.received.lock().await.len(), 1);
}

struct RawHandler(tokio::sync::Mutex<Option<Delivery>>);

#[async_trait]
impl MessageHandler for RawHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        *self.0.lock().await = Some(delivery.clone());
        Ok(())
    }
}

#[tokio::test]
async fn malformed_message_is_requeued_not_dropped() {
    let (connection, topology) = setup("malformed").await;
    let publisher = AmqpPublisher::new(connection.clone());
    let consumer = AmqpConsumer::new(connection, "malformed-test");
    let queue = &topology.bindings[0].queue;

    publisher
        .publish_json(&topology.exchange, "contrato.criado", &serde_json::json!({"ContratoId": 1}))
        .await
        .unwrap();

    let handler = RecordingHandler::default();
    let disposition = consumer.consume_one(queue, &handler).await.unwrap();
    assert_eq!(disposition, Some(Disposition::Requeued));

    let raw = RawHandler(tokio::sync::Mutex::new(None));
    assert_eq!(
        consumer.consume_one(queue, &raw).await.unwrap(),
        Some(Disposition::Acked)
    );
    let delivery = raw.0.lock().await.clone().unwrap();
    assert!(delivery.redelivered);
    assert_eq!(delivery.payload, br#"{"ContratoId":1}"#.to_vec());
}

#[tokio::test]
async fn failed_publishes_leave_connection_usable() {
    let (connection, topology) = setup("channel-reuse").await;
    let publisher = AmqpPublisher::new(connection.clone());
    let consumer = AmqpConsumer::new(connection.clone(), "channel-reuse-test");

    for _ in 0..20 {
        let result = publisher
            .publish_json("channel-reuse.missing.exchange", "contrato.criado", &1)
            .await;
        assert!(result.is_err());
    }

    assert!(connection.is_connected());
    publisher
        .publish_json(&topology.exchange, "contrato.criado", &serde_json::json!({"x": 1}))
        .await
        .unwrap();

    let raw = RawHandler(tokio::sync::Mutex::new(None));
    assert_eq!(
        consumer
            .consume_one(&topology.bindings[0].queue, &raw)
            .await
            .unwrap(),
        Some(Disposition::Acked)
    );
}

#[tokio::test]
async fn long_running_consumer_stops_on_cancel() {
    let (connection, topology) = setup("streaming").await;
    let publisher = ContractEventPublisher::new(
        Arc::new(AmqpPublisher::new(connection.clone())),
        topology.exchange.clone(),
    );
    let consumer = AmqpConsumer::new(connection, "streaming-test");
    let handler = Arc::new(RecordingHandler::default());
    let cancel = CancellationToken::new();

    let task = {
        let handler: Arc<dyn MessageHandler> = handler.clone();
        let queue = topology.bindings[0].queue.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { consumer.start_consuming(&queue, handler, cancel).await })
    };

    for _ in 0..3 {
        publisher
            .publish_contract_created(&Contract::new(ProposalId::new()).created_event())
            .await
            .unwrap();
    }

    for _ in 0..100 {
        if handler.received.lock().await.len() == 3 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert_eq!(handler.received.lock().await.len(), 3);
}
