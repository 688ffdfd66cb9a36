use serde_json::{json, Value};
use thiserror::Error;

use crate::contract::ValidationError;

pub const UNKNOWN_STEP_CODE: &str = "unknown_step";
pub const INVALID_ENVELOPE_CODE: &str = "invalid_envelope";
pub const STEP_FAILED_CODE: &str = "step_failed";

/// Terminal fault of a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("No step is registered for routing path '{routing_path}'")]
    UnknownStep { routing_path: String },
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),
    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },
}

impl InvokeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownStep { .. } => UNKNOWN_STEP_CODE,
            Self::InvalidEnvelope(_) => INVALID_ENVELOPE_CODE,
            Self::StepFailed { .. } => STEP_FAILED_CODE,
        }
    }

    /// JSON payload used as the body of a wrapped fault response.
    pub fn to_error_body(&self) -> Value {
        json!({
            "error": self.code(),
            "message": self.to_string(),
        })
    }
}

impl From<ValidationError> for InvokeError {
    fn from(error: ValidationError) -> Self {
        Self::InvalidEnvelope(error.message().to_string())
    }
}
