//! Generic step executor.
//!
//! A saga is an ordered list of steps. Each step has an `execute` action and
//! an optional `compensate` action. Steps run strictly one after the other;
//! when a step fails, the steps that already completed are compensated in
//! reverse order and the original error is returned. A failing compensation
//! is logged and recorded but never replaces the original error.
//!
//! Cancellation aborts the step in flight and fails the saga without
//! compensating anything, but only until the first step with a compensation
//! starts. From then on the saga ignores cancellation and runs to completion
//! or through compensation, so an effect is never left half applied.

use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SagaError};
use crate::instance::SagaInstance;
use crate::state::SagaState;

/// One step of a saga operating on a shared context `C`.
#[async_trait]
pub trait SagaStep<C: Send>: Send + Sync {
    /// Step name used in logs, metrics and the saga record.
    fn name(&self) -> &'static str;

    /// State the saga is in while this step runs.
    fn running_state(&self) -> SagaState;

    /// State the saga reaches when this step succeeds.
    fn completed_state(&self) -> SagaState;

    /// Performs the step.
    async fn execute(&self, ctx: &mut C) -> Result<()>;

    /// Whether the step leaves an effect that must be undone if a later step fails.
    fn has_compensation(&self) -> bool {
        false
    }

    /// Undoes the effect of a successful `execute`.
    async fn compensate(&self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }
}

/// Runs saga steps in order with reverse-order compensation on failure.
pub struct SagaExecutor<C> {
    saga_type: &'static str,
    steps: Vec<Box<dyn SagaStep<C>>>,
}

impl<C: Send> SagaExecutor<C> {
    /// Creates an executor with no steps.
    pub fn new(saga_type: &'static str) -> Self {
        Self {
            saga_type,
            steps: Vec::new(),
        }
    }

    /// Appends a step.
    pub fn step(mut self, step: impl SagaStep<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Returns the step names in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Runs every step against `ctx`.
    ///
    /// Returns the saga record together with the outcome.
    pub async fn run(&self, ctx: &mut C, cancel: &CancellationToken) -> (SagaInstance, Result<()>) {
        let mut saga = SagaInstance::new(self.saga_type);
        metrics::counter!("saga_executions_total", "saga_type" => self.saga_type).increment(1);
        let started = Instant::now();

        let result = self.run_steps(&mut saga, ctx, cancel).await;

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds", "saga_type" => self.saga_type)
            .record(duration);
        match &result {
            Ok(()) => {
                metrics::counter!("saga_completed", "saga_type" => self.saga_type).increment(1);
                tracing::info!(saga_id = %saga.id(), duration, "saga completed successfully");
            }
            Err(e) => {
                metrics::counter!("saga_failed", "saga_type" => self.saga_type).increment(1);
                tracing::warn!(saga_id = %saga.id(), duration, error = %e, "saga failed");
            }
        }

        (saga, result)
    }

    async fn run_steps(
        &self,
        saga: &mut SagaInstance,
        ctx: &mut C,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut completed: Vec<&dyn SagaStep<C>> = Vec::new();
        let mut committed = false;

        for step in &self.steps {
            committed |= step.has_compensation();
            if !committed && cancel.is_cancelled() {
                return Self::abort(saga, SagaError::Cancelled);
            }

            saga.transition(step.running_state())?;
            tracing::info!(step = step.name(), committed, "saga step started");

            let outcome = if committed {
                step.execute(ctx).await
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(SagaError::Cancelled),
                    result = step.execute(ctx) => result,
                }
            };

            match outcome {
                Ok(()) => {
                    saga.transition(step.completed_state())?;
                    saga.record_step_completed(step.name());
                    completed.push(step.as_ref());
                }
                Err(SagaError::Cancelled) => {
                    tracing::warn!(step = step.name(), "saga step cancelled");
                    return Self::abort(saga, SagaError::Cancelled);
                }
                Err(e) => {
                    tracing::warn!(step = step.name(), error = %e, "saga step failed");
                    Self::compensate(saga, ctx, &completed).await;
                    return Self::abort(saga, e);
                }
            }
        }

        Ok(())
    }

    /// Compensates completed steps in reverse order, at most once each.
    async fn compensate(saga: &mut SagaInstance, ctx: &mut C, completed: &[&dyn SagaStep<C>]) {
        let to_undo: Vec<&dyn SagaStep<C>> = completed
            .iter()
            .rev()
            .copied()
            .filter(|s| s.has_compensation())
            .collect();
        if to_undo.is_empty() {
            return;
        }

        if let Err(e) = saga.transition(SagaState::Compensating) {
            tracing::error!(error = %e, "cannot enter compensation");
            return;
        }
        metrics::counter!("saga_compensations_total", "saga_type" => saga.saga_type()).increment(1);

        for step in to_undo {
            match step.compensate(ctx).await {
                Ok(()) => tracing::info!(step = step.name(), "compensation step completed"),
                Err(e) => {
                    metrics::counter!("saga_compensation_failures_total", "step" => step.name())
                        .increment(1);
                    tracing::error!(step = step.name(), error = %e, "compensation step failed");
                    saga.record_compensation_failure(step.name(), &e);
                }
            }
        }

        if let Err(e) = saga.transition(SagaState::Compensated) {
            tracing::error!(error = %e, "cannot leave compensation");
        }
    }

    fn abort(saga: &mut SagaInstance, error: SagaError) -> Result<()> {
        saga.record_failure(error.to_string());
        if let Err(e) = saga.transition(SagaState::Failed) {
            tracing::error!(error = %e, "cannot mark saga failed");
        }
        Err(error)
    }
}
