//! Exchange, queue and binding declarations.

/// Topic exchange carrying contract-domain facts.
pub const CONTRACTS_EXCHANGE: &str = "contratos.exchange";

/// Queue receiving contract-created facts.
pub const CONTRACT_CREATED_QUEUE: &str = "contrato.criado.queue";

/// Routing key of the contract-created fact.
pub const CONTRACT_CREATED_ROUTING_KEY: &str = "contrato.criado";

/// A durable queue bound to the exchange under a routing pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub queue: String,
    pub routing_key: String,
}

impl QueueBinding {
    pub fn new(queue: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            routing_key: routing_key.into(),
        }
    }
}

/// Broker topology declared at start-up.
///
/// The exchange is a durable, non-auto-deleted topic exchange. Every queue is
/// durable, non-exclusive and non-auto-deleted. Declaring the same topology
/// twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub bindings: Vec<QueueBinding>,
}

impl Topology {
    /// Creates a topology with no queues.
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            bindings: Vec::new(),
        }
    }

    /// Adds a queue bound under `routing_key`.
    pub fn bind(mut self, queue: impl Into<String>, routing_key: impl Into<String>) -> Self {
        self.bindings.push(QueueBinding::new(queue, routing_key));
        self
    }

    /// The contract-domain topology with the given exchange and created-fact queue names.
    pub fn contracts(exchange: impl Into<String>, created_queue: impl Into<String>) -> Self {
        Self::new(exchange).bind(created_queue, CONTRACT_CREATED_ROUTING_KEY)
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::contracts(CONTRACTS_EXCHANGE, CONTRACT_CREATED_QUEUE)
    }
}

/// Matches a routing key against a topic binding pattern.
///
/// Words are separated by `.`; `*` matches exactly one word and `#` matches
/// zero or more words.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.first(), key.first()) {
        (None, None) => true,
        (Some(&"#"), _) => {
            // '#' swallows zero words, or one word and stays in place.
            matches_words(&pattern[1..], key) || (!key.is_empty() && matches_words(pattern, &key[1..]))
        }
        (Some(_), None) | (None, Some(_)) => false,
        (Some(&"*"), Some(_)) => matches_words(&pattern[1..], &key[1..]),
        (Some(word), Some(part)) => word == part && matches_words(&pattern[1..], &key[1..]),
    }
}
