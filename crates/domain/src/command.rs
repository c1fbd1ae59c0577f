//! Command pipeline: validate → execute.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ValidationErrors;

/// Whether a request mutates state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Mutates state. A failure is logged and counted.
    Write,
    /// Read-only.
    Query,
}

/// A request dispatched through the [`CommandPipeline`].
pub trait Command: Send + Sync {
    /// The value produced by a successful execution.
    type Output: Send;

    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Whether the command writes. Defaults to [`CommandKind::Write`].
    fn kind(&self) -> CommandKind {
        CommandKind::Write
    }

    /// Checks every field rule and reports all failures together.
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

/// Executes one type of command.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Error returned by the handler. Validation failures must convert into it.
    type Error: From<ValidationErrors> + std::fmt::Display + Send;

    /// Executes an already-validated command.
    async fn handle(&self, command: C, cancel: &CancellationToken) -> Result<C::Output, Self::Error>;
}

/// Cross-cutting wrapper every request passes through.
///
/// 1. validation: all field errors are collected, and the request is rejected
///    before any side effect if there are any
/// 2. execution: the handler runs
///
/// There is no rollback stage. Every repository write commits on its own, so
/// a failed write command has nothing staged to discard; effects committed
/// before the failure are undone by the saga's compensation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandPipeline;

impl CommandPipeline {
    pub fn new() -> Self {
        Self
    }

    /// Validates and executes `command` with `handler`.
    #[tracing::instrument(skip_all, fields(command = command.name()))]
    pub async fn dispatch<C, H>(
        &self,
        handler: &H,
        command: C,
        cancel: &CancellationToken,
    ) -> Result<C::Output, H::Error>
    where
        C: Command,
        H: CommandHandler<C>,
    {
        if let Err(errors) = command.validate() {
            metrics::counter!("commands_rejected_total", "command" => command.name())
                .increment(1);
            tracing::warn!(%errors, "command rejected by validation");
            return Err(errors.into());
        }

        let name = command.name();
        let kind = command.kind();
        let result = handler.handle(command, cancel).await;

        if let Err(e) = &result {
            match kind {
                CommandKind::Write => {
                    metrics::counter!("commands_failed_total", "command" => name).increment(1);
                    tracing::warn!(error = %e, "write command failed");
                }
                CommandKind::Query => tracing::debug!(error = %e, "query failed"),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("{0}")]
        Validation(#[from] ValidationErrors),
        #[error("handler failed")]
        Failed,
    }

    struct Rename {
        name: String,
        fail: bool,
    }

    impl Command for Rename {
        type Output = String;

        fn name(&self) -> &'static str {
            "Rename"
        }

        fn validate(&self) -> Result<(), ValidationErrors> {
            let mut errors = ValidationErrors::new();
            if self.name.is_empty() {
                errors.add("name", "is required");
            }
            if self.name.len() > 8 {
                errors.add("name", "is too long");
            }
            if self.name.contains(' ') {
                errors.add("name", "must not contain spaces");
            }
            errors.into_result()
        }
    }

    struct Lookup {
        fail: bool,
    }

    impl Command for Lookup {
        type Output = u32;

        fn name(&self) -> &'static str {
            "Lookup"
        }

        fn kind(&self) -> CommandKind {
            CommandKind::Query
        }
    }

    #[derive(Default)]
    struct TestHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandHandler<Rename> for TestHandler {
        type Error = TestError;

        async fn handle(&self, command: Rename, _: &CancellationToken) -> Result<String, TestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if command.fail {
                return Err(TestError::Failed);
            }
            Ok(command.name)
        }
    }

    #[async_trait]
    impl CommandHandler<Lookup> for TestHandler {
        type Error = TestError;

        async fn handle(&self, command: Lookup, _: &CancellationToken) -> Result<u32, TestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if command.fail {
                return Err(TestError::Failed);
            }
            Ok(7)
        }
    }

    fn setup() -> (CommandPipeline, TestHandler) {
        (CommandPipeline::new(), TestHandler::default())
    }

    #[tokio::test]
    async fn test_valid_write_executes() {
        let (pipeline, handler) = setup();
        let cancel = CancellationToken::new();

        let out = pipeline
            .dispatch(&handler, Rename { name: "alpha".into(), fail: false }, &cancel)
            .await
            .unwrap();

        assert_eq!(out, "alpha");
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_aggregates_errors_and_skips_handler() {
        let (pipeline, handler) = setup();
        let cancel = CancellationToken::new();

        let err = pipeline
            .dispatch(&handler, Rename { name: "far too long".into(), fail: false }, &cancel)
            .await
            .unwrap_err();

        match err {
            TestError::Validation(errors) => assert_eq!(errors.errors().len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_write_returns_handler_error() {
        let (pipeline, handler) = setup();
        let cancel = CancellationToken::new();

        let err = pipeline
            .dispatch(&handler, Rename { name: "beta".into(), fail: true }, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, TestError::Failed));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_query_returns_handler_error() {
        let (pipeline, handler) = setup();
        let cancel = CancellationToken::new();

        let result = pipeline.dispatch(&handler, Lookup { fail: true }, &cancel).await;

        assert!(matches!(result, Err(TestError::Failed)));
    }

    #[tokio::test]
    async fn test_query_executes() {
        let (pipeline, handler) = setup();
        let cancel = CancellationToken::new();

        let out = pipeline.dispatch(&handler, Lookup { fail: false }, &cancel).await.unwrap();
        assert_eq!(out, 7);
    }
}
