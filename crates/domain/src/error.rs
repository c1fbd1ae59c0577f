//! Field-level validation errors.

use thiserror::Error;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    /// Name of the offending field as the caller sent it.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

/// All field errors found while validating one request.
///
/// Validation never stops at the first problem: every rule runs and the
/// failures are reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("Validation failed: {}", join(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Creates an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if no failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the recorded failures in insertion order.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Converts the set into a result: `Ok(())` when empty.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(FieldError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
