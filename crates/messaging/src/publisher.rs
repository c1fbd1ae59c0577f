//! Publishing side of the messaging substrate.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{ContractCreated, DomainEvent};
use serde::Serialize;

use crate::message::OutgoingMessage;
use crate::topology::CONTRACT_CREATED_ROUTING_KEY;
use crate::Result;

/// Sends messages to a broker exchange.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes one message. Returns once the broker has taken responsibility
    /// for it, or with an error if it could not.
    async fn publish(&self, message: OutgoingMessage) -> Result<()>;
}

/// Extension trait providing convenience methods for publishers.
#[async_trait]
pub trait MessagePublisherExt: MessagePublisher {
    /// Serializes `body` as JSON and publishes it persistently.
    async fn publish_json<T>(&self, exchange: &str, routing_key: &str, body: &T) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.publish(OutgoingMessage::json(exchange, routing_key, body)?)
            .await
    }
}

// Blanket implementation for all MessagePublisher types
impl<T: MessagePublisher + ?Sized> MessagePublisherExt for T {}

#[async_trait]
impl<T: MessagePublisher + ?Sized> MessagePublisher for Arc<T> {
    async fn publish(&self, message: OutgoingMessage) -> Result<()> {
        (**self).publish(message).await
    }
}

/// Publishes contract-domain events to the contracts exchange.
#[derive(Clone)]
pub struct ContractEventPublisher {
    publisher: Arc<dyn MessagePublisher>,
    exchange: String,
}

impl ContractEventPublisher {
    /// Creates a publisher sending to `exchange` through `publisher`.
    pub fn new(publisher: Arc<dyn MessagePublisher>, exchange: impl Into<String>) -> Self {
        Self {
            publisher,
            exchange: exchange.into(),
        }
    }

    /// Returns the target exchange name.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Publishes any domain event under `routing_key`.
    #[tracing::instrument(skip(self, event), fields(event_type = event.event_type(), exchange = %self.exchange))]
    pub async fn publish_event<E: DomainEvent>(&self, routing_key: &str, event: &E) -> Result<()> {
        self.publisher
            .publish_json(&self.exchange, routing_key, event)
            .await
    }

    /// Publishes the contract-created fact.
    pub async fn publish_contract_created(&self, event: &ContractCreated) -> Result<()> {
        self.publish_event(CONTRACT_CREATED_ROUTING_KEY, event).await
    }
}
