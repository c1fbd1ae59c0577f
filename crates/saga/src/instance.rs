//! Saga instance record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::SagaError;
use crate::state::SagaState;

/// Tracks one saga execution: every state visited, the steps that completed
/// and why the saga failed.
#[derive(Debug, Clone, Serialize)]
pub struct SagaInstance {
    id: Uuid,
    saga_type: &'static str,
    state: SagaState,
    history: Vec<SagaState>,
    completed_steps: Vec<&'static str>,
    failure_reason: Option<String>,
    compensation_failures: Vec<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl SagaInstance {
    /// Creates a saga instance in the `NotStarted` state.
    pub fn new(saga_type: &'static str) -> Self {
        Self {
            id: Uuid::new_v4(),
            saga_type,
            state: SagaState::NotStarted,
            history: vec![SagaState::NotStarted],
            completed_steps: Vec::new(),
            failure_reason: None,
            compensation_failures: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Moves to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, next: SagaState) -> Result<(), SagaError> {
        if !self.state.can_transition_to(next) {
            return Err(SagaError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!(saga_id = %self.id, from = %self.state, to = %next, "saga transition");
        self.state = next;
        self.history.push(next);
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Records that a step finished successfully.
    pub fn record_step_completed(&mut self, step: &'static str) {
        self.completed_steps.push(step);
    }

    /// Records the error that made the saga fail.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
    }

    /// Records a compensation that could not be carried out.
    pub fn record_compensation_failure(&mut self, step: &'static str, reason: impl std::fmt::Display) {
        self.compensation_failures.push(format!("{step}: {reason}"));
    }
}

// Query methods
impl SagaInstance {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn saga_type(&self) -> &'static str {
        self.saga_type
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Every state visited, in order, starting with `NotStarted`.
    pub fn history(&self) -> &[SagaState] {
        &self.history
    }

    pub fn completed_steps(&self) -> &[&'static str] {
        &self.completed_steps
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn compensation_failures(&self) -> &[String] {
        &self.compensation_failures
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}
