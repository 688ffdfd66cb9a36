use serde_json::{json, Value};
use statemachine_core::error::InvokeError;
use statemachine_core::invoker::{DispatchOutcome, InvocationResponse, WorkflowInvoker};
use statemachine_core::logging::{log_info, log_warn};

use crate::adapters::state_store::StateManager;

/// Runs one step for a raw Lambda event, checkpoints it, then shapes the response.
///
/// The checkpoint is best effort: a storage failure is logged and the step
/// result is still returned.
pub fn handle_workflow_event(
    event: Value,
    request_id: &str,
    invoker: &WorkflowInvoker,
    states: Option<&StateManager>,
) -> Result<InvocationResponse, InvokeError> {
    let result = invoker.dispatch(event, request_id);

    if let (Ok(outcome), Some(states)) = (&result, states) {
        checkpoint(outcome, request_id, states);
    }

    invoker.shape(result)
}

fn checkpoint(outcome: &DispatchOutcome, request_id: &str, states: &StateManager) {
    let Some(execution_id) = outcome.execution_id.as_deref() else {
        return;
    };

    let snapshot = json!({
        "input": outcome.envelope.input,
        "output": outcome.envelope.output,
        "lastStep": outcome.step,
    });

    match states.update_state(execution_id, &snapshot) {
        Ok(_) => log_info(
            "workflow_handler",
            "checkpoint_saved",
            json!({
                "request_id": request_id,
                "execution_id": execution_id,
                "step": outcome.step,
            }),
        ),
        Err(error) => log_warn(
            "workflow_handler",
            "checkpoint_failed",
            json!({
                "request_id": request_id,
                "execution_id": execution_id,
                "step": outcome.step,
                "error": error.to_string(),
            }),
        ),
    }
}
