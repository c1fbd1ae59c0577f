//! Consuming side of the messaging substrate.
//!
//! A delivery is acknowledged only after its handler returns `Ok`. Any
//! handler failure, an undecodable body included, negatively acknowledges it
//! with requeue, so the broker redelivers it. There is no retry cap and no
//! dead-letter routing: a message is never dropped by the consumer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::message::Delivery;
use crate::Result;

/// Failure reported by a [`MessageHandler`].
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The body cannot be understood. The message is requeued and logged as an error.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Processing failed. The message is requeued for redelivery.
    #[error("Handler failed: {0}")]
    Failed(String),
}

/// Processes deliveries taken from a queue.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> std::result::Result<(), HandlerError>;
}

/// Decodes a JSON delivery body, mapping failures to [`HandlerError::Malformed`].
pub fn decode_json<T: DeserializeOwned>(delivery: &Delivery) -> std::result::Result<T, HandlerError> {
    serde_json::from_slice(&delivery.payload).map_err(|e| HandlerError::Malformed(e.to_string()))
}

/// What happened to a delivery after its handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledged and removed from the queue.
    Acked,
    /// Negatively acknowledged and put back on the queue.
    Requeued,
}

/// Takes deliveries from queues and settles them according to the handler outcome.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Fetches at most one delivery from `queue` and settles it.
    ///
    /// Returns `None` if the queue was empty.
    async fn consume_one(
        &self,
        queue: &str,
        handler: &dyn MessageHandler,
    ) -> Result<Option<Disposition>>;

    /// Consumes from `queue` until `cancel` fires.
    async fn start_consuming(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<()>;
}

/// Runs `handler` on `delivery` and decides how to settle it.
pub(crate) async fn dispatch(
    queue: &str,
    handler: &dyn MessageHandler,
    delivery: &Delivery,
) -> Disposition {
    match handler.handle(delivery).await {
        Ok(()) => {
            metrics::counter!("messages_acked_total", "queue" => queue.to_string()).increment(1);
            tracing::debug!(queue, routing_key = %delivery.routing_key, "message handled");
            Disposition::Acked
        }
        Err(HandlerError::Failed(reason)) => {
            metrics::counter!("messages_nacked_total", "queue" => queue.to_string()).increment(1);
            tracing::warn!(
                queue,
                routing_key = %delivery.routing_key,
                redelivered = delivery.redelivered,
                %reason,
                "handler failed, requeueing message"
            );
            Disposition::Requeued
        }
        Err(HandlerError::Malformed(reason)) => {
            metrics::counter!("messages_nacked_total", "queue" => queue.to_string()).increment(1);
            metrics::counter!("messages_malformed_total", "queue" => queue.to_string()).increment(1);
            tracing::error!(
                queue,
                routing_key = %delivery.routing_key,
                redelivered = delivery.redelivered,
                %reason,
                "malformed message, requeueing"
            );
            Disposition::Requeued
        }
    }
}
