//! HTTP route handlers.

pub mod contracts;
pub mod health;
pub mod metrics;
