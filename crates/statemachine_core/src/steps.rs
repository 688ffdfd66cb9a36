use serde_json::{json, Value};

use crate::envelope::{output_key_for, Envelope, StepResult};
use crate::logging::log_info;

/// Per-invocation values a step may read. Built fresh by the invoker for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    pub request_id: String,
    pub now_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepError {
    pub message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StepError {}

/// One named, stateless unit of workflow computation.
///
/// Implementors only provide [`StepHandler::compute`]; [`StepHandler::execute`]
/// writes the result under the step's own output key and leaves `input` and
/// every other output key alone.
pub trait StepHandler: Send + Sync {
    fn name(&self) -> &str;

    fn compute(&self, envelope: &Envelope, context: &StepContext) -> Result<Value, StepError>;

    fn output_key(&self) -> String {
        output_key_for(self.name())
    }

    fn execute(&self, mut envelope: Envelope, context: &StepContext) -> Result<Envelope, StepError> {
        let contribution = self.compute(&envelope, context)?;
        envelope.merge_output(self.output_key(), contribution);
        Ok(envelope)
    }
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Records `{key: <step name>, time: <now>}`. Both built-in states are of this kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampStep {
    name: String,
}

impl TimestampStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl StepHandler for TimestampStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, envelope: &Envelope, context: &StepContext) -> Result<Value, StepError> {
        log_info(
            "step",
            "step_input",
            json!({
                "step": self.name,
                "request_id": context.request_id,
                "input": envelope.input,
            }),
        );

        serde_json::to_value(StepResult {
            key: self.name.clone(),
            time: context.now_ms,
        })
        .map_err(|error| StepError::new(format!("Failed to encode step result: {error}")))
    }
}

pub const STATE1: &str = "state1";
pub const STATE2: &str = "state2";

pub fn default_steps() -> Vec<TimestampStep> {
    vec![TimestampStep::new(STATE1), TimestampStep::new(STATE2)]
}
