use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::contract::{input_fingerprint, TriggerEvent};
use crate::envelope::Envelope;
use crate::error::InvokeError;
use crate::logging::{log_error, log_info};
use crate::registry::StepRegistry;
use crate::steps::{Clock, StepContext, SystemClock};

/// How a finished invocation is handed back. Fixed when the invoker is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    /// Status code + serialized body, for gateway proxy integrations.
    Wrapped,
    /// The raw envelope, for direct step-to-step chaining.
    Bare,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum InvocationResponse {
    Wrapped(ApiGatewayResponse),
    Bare(Envelope),
}

/// A step that ran to completion, before response shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub step: String,
    pub envelope: Envelope,
    pub execution_id: Option<String>,
}

pub struct WorkflowInvoker {
    registry: Arc<StepRegistry>,
    mode: InvocationMode,
    clock: Arc<dyn Clock>,
}

impl WorkflowInvoker {
    pub fn new(registry: Arc<StepRegistry>, mode: InvocationMode) -> Self {
        Self::with_clock(registry, mode, Arc::new(SystemClock))
    }

    pub fn with_clock(
        registry: Arc<StepRegistry>,
        mode: InvocationMode,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            mode,
            clock,
        }
    }

    pub fn mode(&self) -> InvocationMode {
        self.mode
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Dispatch and shape in one call.
    ///
    /// In wrapped mode every fault becomes a 500 response and this never
    /// returns `Err`. In bare mode faults are returned to the caller.
    pub fn invoke(
        &self,
        event: Value,
        request_id: &str,
    ) -> Result<InvocationResponse, InvokeError> {
        self.shape(self.dispatch(event, request_id))
    }

    /// Normalizes the trigger, resolves its step and runs it exactly once.
    pub fn dispatch(&self, event: Value, request_id: &str) -> Result<DispatchOutcome, InvokeError> {
        let trigger = TriggerEvent::normalize(event)?;
        let routing_path = trigger.routing_path.as_deref();

        let handler = match self.registry.resolve(routing_path) {
            Ok(handler) => handler,
            Err(error) => {
                log_error(
                    "invoker",
                    "unknown_step",
                    json!({
                        "request_id": request_id,
                        "routing_path": routing_path,
                        "known_steps": self.registry.names(),
                    }),
                );
                return Err(error);
            }
        };

        let step = handler.name().to_string();
        let envelope = trigger.envelope()?;
        let fingerprint = input_fingerprint(&envelope.input);
        let context = StepContext {
            request_id: request_id.to_string(),
            now_ms: self.clock.now_ms(),
        };

        log_info(
            "invoker",
            "step_started",
            json!({
                "request_id": request_id,
                "step": step,
                "input_fingerprint": fingerprint,
                "output_keys": envelope.output_keys().collect::<Vec<_>>(),
            }),
        );

        let envelope = handler
            .execute(envelope, &context)
            .map_err(|error| InvokeError::StepFailed {
                step: step.clone(),
                message: error.message,
            })?;

        log_info(
            "invoker",
            "step_completed",
            json!({
                "request_id": request_id,
                "step": step,
                "input_fingerprint": fingerprint,
                "output_keys": envelope.output_keys().collect::<Vec<_>>(),
            }),
        );

        Ok(DispatchOutcome {
            step,
            envelope,
            execution_id: trigger.execution_id().map(str::to_string),
        })
    }

    pub fn shape(
        &self,
        result: Result<DispatchOutcome, InvokeError>,
    ) -> Result<InvocationResponse, InvokeError> {
        match (self.mode, result) {
            (InvocationMode::Bare, result) => {
                result.map(|outcome| InvocationResponse::Bare(outcome.envelope))
            }
            (InvocationMode::Wrapped, Ok(outcome)) => {
                Ok(InvocationResponse::Wrapped(success_response(&outcome.envelope)))
            }
            (InvocationMode::Wrapped, Err(error)) => {
                log_error(
                    "invoker",
                    "invocation_failed",
                    json!({
                        "error": error.code(),
                        "message": error.to_string(),
                    }),
                );
                Ok(InvocationResponse::Wrapped(fault_response(&error)))
            }
        }
    }
}

impl std::fmt::Debug for WorkflowInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowInvoker")
            .field("registry", &self.registry)
            .field("mode", &self.mode)
            .finish()
    }
}

fn success_response(envelope: &Envelope) -> ApiGatewayResponse {
    match serde_json::to_string(envelope) {
        Ok(body) => ApiGatewayResponse {
            status_code: 200,
            headers: json_headers(),
            body,
        },
        Err(error) => fault_response(&InvokeError::InvalidEnvelope(format!(
            "Failed to serialize envelope: {error}"
        ))),
    }
}

pub fn fault_response(error: &InvokeError) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code: 500,
        headers: json_headers(),
        body: error.to_error_body().to_string(),
    }
}

fn json_headers() -> Value {
    json!({"Content-Type": "application/json"})
}

#[cfg(test)]
mod tests {
    use crate::steps::{FixedClock, StepError, StepHandler};

    use super::*;

    struct ExplodingStep;

    impl StepHandler for ExplodingStep {
        fn name(&self) -> &str {
            "explode"
        }

        fn compute(&self, _envelope: &Envelope, _context: &StepContext) -> Result<Value, StepError> {
            Err(StepError::new("boom"))
        }
    }

    fn invoker(mode: InvocationMode) -> WorkflowInvoker {
        WorkflowInvoker::with_clock(
            Arc::new(StepRegistry::with_default_steps()),
            mode,
            Arc::new(FixedClock(1_000)),
        )
    }

    fn trigger(path: &str) -> Value {
        json!({
            "path": path,
            "body": {"input": {"inputFile": "input.json"}, "output": {}},
        })
    }

    #[test]
    fn bare_mode_returns_raw_envelope() {
        let response = invoker(InvocationMode::Bare)
            .invoke(trigger("/payments/v1/state1"), "req-1")
            .expect("state1 should succeed");

        let InvocationResponse::Bare(envelope) = response else {
            panic!("bare mode must not wrap the envelope");
        };
        assert_eq!(
            envelope.output["state1Value"],
            json!({"key": "state1", "time": 1_000})
        );
    }

    #[test]
    fn wrapped_mode_turns_unknown_step_into_500() {
        let response = invoker(InvocationMode::Wrapped)
            .invoke(trigger("/payments/v1/state3"), "req-2")
            .expect("wrapped mode never errors");

        let InvocationResponse::Wrapped(response) = response else {
            panic!("wrapped mode must wrap");
        };
        assert_eq!(response.status_code, 500);
        let body: Value = serde_json::from_str(&response.body).expect("body should be json");
        assert_eq!(body["error"], json!("unknown_step"));
    }

    #[test]
    fn bare_mode_propagates_step_fault() {
        let registry = StepRegistry::builder()
            .register(ExplodingStep)
            .build()
            .expect("registry should build");
        let invoker = WorkflowInvoker::new(Arc::new(registry), InvocationMode::Bare);

        let error = invoker
            .invoke(trigger("/payments/v1/explode"), "req-3")
            .expect_err("failing step should fault");
        assert_eq!(
            error,
            InvokeError::StepFailed {
                step: "explode".to_string(),
                message: "boom".to_string(),
            }
        );
    }

    #[test]
    fn routing_is_checked_before_envelope_shape() {
        let error = invoker(InvocationMode::Bare)
            .invoke(json!({"path": "/payments/v1/nope", "body": ""}), "req-4")
            .expect_err("should fault");
        assert_eq!(error.code(), "unknown_step");
    }

    #[test]
    fn dispatch_reports_execution_id_from_metadata() {
        let mut event = trigger("/payments/v1/state2");
        event["metadata"] = json!({"executionId": "exec-42"});

        let outcome = invoker(InvocationMode::Bare)
            .dispatch(event, "req-5")
            .expect("dispatch should succeed");
        assert_eq!(outcome.step, "state2");
        assert_eq!(outcome.execution_id.as_deref(), Some("exec-42"));
    }

    #[test]
    fn invocation_response_serializes_without_variant_tag() {
        let response = invoker(InvocationMode::Wrapped)
            .invoke(trigger("/payments/v1/state1"), "req-6")
            .expect("state1 should succeed");
        let value = serde_json::to_value(&response).expect("response should serialize");
        assert_eq!(value["statusCode"], json!(200));
        assert!(value["body"].is_string());
    }
}
