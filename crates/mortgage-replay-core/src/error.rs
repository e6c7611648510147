use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum MortgageReplayError {
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Period {period} is outside the schedule (1..={max})")]
    PeriodOutOfRange { period: u32, max: u32 },

    #[error("Invalid {kind}: {reason}")]
    InvalidOperation { kind: String, reason: String },

    #[error("Validation failed: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for MortgageReplayError {
    fn from(e: serde_json::Error) -> Self {
        MortgageReplayError::SerializationError(e.to_string())
    }
}
