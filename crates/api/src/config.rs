//! Application configuration loaded from environment variables.

use std::time::Duration;

use messaging::{CONTRACT_CREATED_QUEUE, CONTRACTS_EXCHANGE};
use thiserror::Error;

/// A variable was set to a value that cannot be used.
#[derive(Debug, Error)]
#[error("Invalid value for {variable}: {value:?}")]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default: `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset keeps contracts in memory
/// - `AMQP_URL`: broker URL; unset uses the in-memory broker
/// - `PROPOSAL_SERVICE_URL`, `PROPOSAL_SERVICE_TIMEOUT_SECS`: proposal lookups
/// - `CONTRACTS_EXCHANGE`, `CONTRACT_CREATED_QUEUE`: broker topology names
/// - `CONSUME_CONTRACT_EVENTS`: start a consumer that logs contract-created events
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub amqp_url: Option<String>,
    pub proposal_service_url: String,
    pub proposal_service_timeout: Duration,
    pub contracts_exchange: String,
    pub contract_created_queue: String,
    pub consume_contract_events: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(p) => parse("PORT", &p, |v| v.parse().ok())?,
            None => defaults.port,
        };
        let log_format = match var("LOG_FORMAT") {
            Some(f) => parse("LOG_FORMAT", &f, |v| match v.to_ascii_lowercase().as_str() {
                "text" | "pretty" => Some(LogFormat::Text),
                "json" => Some(LogFormat::Json),
                _ => None,
            })?,
            None => defaults.log_format,
        };
        let proposal_service_timeout = match var("PROPOSAL_SERVICE_TIMEOUT_SECS") {
            Some(t) => parse("PROPOSAL_SERVICE_TIMEOUT_SECS", &t, |v| {
                v.parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
            })?,
            None => defaults.proposal_service_timeout,
        };
        let consume_contract_events = match var("CONSUME_CONTRACT_EVENTS") {
            Some(c) => parse("CONSUME_CONTRACT_EVENTS", &c, parse_bool)?,
            None => defaults.consume_contract_events,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: var("DATABASE_URL"),
            amqp_url: var("AMQP_URL"),
            proposal_service_url: var("PROPOSAL_SERVICE_URL")
                .unwrap_or(defaults.proposal_service_url),
            proposal_service_timeout,
            contracts_exchange: var("CONTRACTS_EXCHANGE").unwrap_or(defaults.contracts_exchange),
            contract_created_queue: var("CONTRACT_CREATED_QUEUE")
                .unwrap_or(defaults.contract_created_queue),
            consume_contract_events,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(
    variable: &'static str,
    value: &str,
    f: impl FnOnce(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    f(value.trim()).ok_or_else(|| ConfigError {
        variable,
        value: value.to_string(),
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            amqp_url: None,
            proposal_service_url: "http://localhost:5000".to_string(),
            proposal_service_timeout: saga::services::DEFAULT_TIMEOUT,
            contracts_exchange: CONTRACTS_EXCHANGE.to_string(),
            contract_created_queue: CONTRACT_CREATED_QUEUE.to_string(),
            consume_contract_events: false,
        }
    }
}
