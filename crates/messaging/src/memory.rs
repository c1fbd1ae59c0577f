use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::consumer::{Disposition, MessageConsumer, MessageHandler, dispatch};
use crate::message::{Delivery, OutgoingMessage};
use crate::publisher::MessagePublisher;
use crate::topology::{Topology, topic_matches};
use crate::{MessagingError, Result};

#[derive(Default)]
struct BrokerState {
    /// exchange -> (queue, binding pattern)
    exchanges: HashMap<String, Vec<(String, String)>>,
    queues: HashMap<String, VecDeque<Delivery>>,
    published: usize,
}

/// In-memory broker for testing.
///
/// Follows the topic-exchange routing rules of the AMQP backend. A message
/// that matches no binding is dropped. While a handler runs, its delivery is
/// held outside the queue exactly like an unacknowledged AMQP delivery.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    arrivals: Arc<Notify>,
    unreachable: Arc<AtomicBool>,
}

impl InMemoryBroker {
    /// Creates a broker with no exchanges or queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the exchange and queues of `topology`. Idempotent.
    pub async fn declare_topology(&self, topology: &Topology) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().await;

        let bindings = state.exchanges.entry(topology.exchange.clone()).or_default();
        for binding in &topology.bindings {
            let entry = (binding.queue.clone(), binding.routing_key.clone());
            if !bindings.contains(&entry) {
                bindings.push(entry);
            }
        }
        for binding in &topology.bindings {
            state.queues.entry(binding.queue.clone()).or_default();
        }
        Ok(())
    }

    /// Simulates the broker becoming unreachable (or reachable again).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Returns the number of messages waiting in `queue`.
    pub async fn queue_len(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Returns a copy of the messages waiting in `queue`, oldest first.
    pub async fn queued_messages(&self, queue: &str) -> Vec<Delivery> {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of messages accepted by the broker so far.
    pub async fn published_count(&self) -> usize {
        self.state.lock().await.published
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(MessagingError::Unavailable(
                "in-memory broker is unreachable".to_string(),
            ));
        }
        Ok(())
    }

    async fn take(&self, queue: &str) -> Result<Option<Delivery>> {
        let mut state = self.state.lock().await;
        let messages = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| MessagingError::QueueNotFound(queue.to_string()))?;
        Ok(messages.pop_front())
    }

    async fn requeue(&self, queue: &str, mut delivery: Delivery) {
        delivery.redelivered = true;
        if let Some(messages) = self.state.lock().await.queues.get_mut(queue) {
            messages.push_front(delivery);
        }
        self.arrivals.notify_waiters();
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    #[tracing::instrument(skip(self, message), fields(exchange = %message.exchange, routing_key = %message.routing_key))]
    async fn publish(&self, message: OutgoingMessage) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().await;

        let targets: Vec<String> = state
            .exchanges
            .get(&message.exchange)
            .ok_or_else(|| MessagingError::ExchangeNotFound(message.exchange.clone()))?
            .iter()
            .filter(|(_, pattern)| topic_matches(pattern, &message.routing_key))
            .map(|(queue, _)| queue.clone())
            .collect();

        if targets.is_empty() {
            tracing::debug!("no binding matched, message dropped");
        }

        for queue in targets {
            let delivery = Delivery {
                exchange: message.exchange.clone(),
                routing_key: message.routing_key.clone(),
                payload: message.payload.clone(),
                content_type: Some(message.content_type.clone()),
                persistent: message.persistent,
                redelivered: false,
            };
            state.queues.entry(queue).or_default().push_back(delivery);
        }
        state.published += 1;
        drop(state);

        metrics::counter!("messages_published_total", "routing_key" => message.routing_key.clone())
            .increment(1);
        self.arrivals.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for InMemoryBroker {
    async fn consume_one(
        &self,
        queue: &str,
        handler: &dyn MessageHandler,
    ) -> Result<Option<Disposition>> {
        self.ensure_reachable()?;
        let Some(delivery) = self.take(queue).await? else {
            return Ok(None);
        };

        let disposition = dispatch(queue, handler, &delivery).await;
        if disposition == Disposition::Requeued {
            self.requeue(queue, delivery).await;
        }
        Ok(Some(disposition))
    }

    #[tracing::instrument(skip(self, handler, cancel))]
    async fn start_consuming(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<()> {
        tracing::info!("consumer started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            // Register interest before looking, so a publish in between is not missed.
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            match self.consume_one(queue, handler.as_ref()).await? {
                Some(Disposition::Requeued) => tokio::task::yield_now().await,
                Some(_) => {}
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = &mut arrival => {}
                    }
                }
            }
        }
        tracing::info!("consumer stopped");
        Ok(())
    }
}
