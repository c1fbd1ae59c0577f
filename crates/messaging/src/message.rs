//! Messages as they travel to and from the broker.

use serde::Serialize;

use crate::Result;

/// Content type of every message body produced here.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A message ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub content_type: String,
    /// Persistent messages survive a broker restart (delivery mode 2).
    pub persistent: bool,
}

impl OutgoingMessage {
    /// Serializes `body` as JSON into a persistent message.
    pub fn json<T: Serialize + ?Sized>(
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        body: &T,
    ) -> Result<Self> {
        Ok(Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            payload: serde_json::to_vec(body)?,
            content_type: JSON_CONTENT_TYPE.to_string(),
            persistent: true,
        })
    }
}

/// A message received from a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub content_type: Option<String>,
    pub persistent: bool,
    /// True if the broker delivered this message before and it was requeued.
    pub redelivered: bool,
}

impl Delivery {
    /// Returns the body as UTF-8 text, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
