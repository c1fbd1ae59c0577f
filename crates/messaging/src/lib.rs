//! Messaging substrate for contract-domain facts.
//!
//! This crate provides:
//! - broker topology: a durable topic exchange with durable queues bound by routing key
//! - publishing: JSON bodies, persistent delivery, one logical channel per operation
//! - consumption: ack after the handler succeeds, nack with requeue when it fails
//! - an AMQP backend built on `lapin` and an in-memory broker for tests

pub mod amqp;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod topology;

pub use amqp::{AmqpConsumer, AmqpPublisher, BrokerConnection};
pub use consumer::{Disposition, HandlerError, MessageConsumer, MessageHandler, decode_json};
pub use error::{MessagingError, Result};
pub use memory::InMemoryBroker;
pub use message::{Delivery, OutgoingMessage};
pub use publisher::{ContractEventPublisher, MessagePublisher, MessagePublisherExt};
pub use topology::{
    CONTRACT_CREATED_QUEUE, CONTRACT_CREATED_ROUTING_KEY, CONTRACTS_EXCHANGE, QueueBinding,
    Topology, topic_matches,
};
