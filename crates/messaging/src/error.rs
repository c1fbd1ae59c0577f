//! Messaging error types.

use thiserror::Error;

/// Errors that can occur when talking to the message broker.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The AMQP client reported an error (connection, channel or protocol).
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// The broker cannot be reached.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The broker refused a published message.
    #[error("Broker rejected message for {exchange}/{routing_key}")]
    PublishRejected {
        exchange: String,
        routing_key: String,
    },

    /// Publishing to an exchange that was never declared.
    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),

    /// Consuming from a queue that was never declared.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// The message body could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
