use std::sync::Arc;

use serde_json::{json, Value};
use statemachine_core::envelope::Envelope;
use statemachine_core::invoker::{InvocationMode, InvocationResponse, WorkflowInvoker};
use statemachine_core::registry::StepRegistry;
use statemachine_core::steps::{FixedClock, StepContext, StepHandler, TimestampStep};

fn invoker(mode: InvocationMode, now_ms: i64) -> WorkflowInvoker {
    WorkflowInvoker::with_clock(
        Arc::new(StepRegistry::with_default_steps()),
        mode,
        Arc::new(FixedClock(now_ms)),
    )
}

fn bare(response: InvocationResponse) -> Envelope {
    match response {
        InvocationResponse::Bare(envelope) => envelope,
        InvocationResponse::Wrapped(response) => {
            panic!("expected bare envelope, got status {}", response.status_code)
        }
    }
}

fn initial_body() -> Value {
    json!({"input": {"inputFile": "input.json"}, "output": {}})
}

#[test]
fn state1_then_state2_accumulates_both_results() {
    let invoker = invoker(InvocationMode::Bare, 1_700_000_000_000);

    let first = bare(
        invoker
            .invoke(
                json!({"path": "/payments/v1/state1", "body": initial_body()}),
                "statemachine.1",
            )
            .expect("state1 should succeed"),
    );

    let second = bare(
        invoker
            .invoke(
                json!({"path": "/payments/v1/state2", "body": first}),
                "statemachine.1",
            )
            .expect("state2 should succeed"),
    );

    assert_eq!(second.input, json!({"inputFile": "input.json"}));
    for (key, step) in [("state1Value", "state1"), ("state2Value", "state2")] {
        let value = &second.output[key];
        assert_eq!(value["key"], json!(step));
        assert!(value["time"].is_number(), "{key}.time should be numeric");
    }
    assert_eq!(second.output.len(), 2);
}

#[test]
fn wrapped_body_matches_bare_result() {
    let event = json!({"path": "/coupons/v1/state1", "body": initial_body()});

    let bare_envelope = bare(
        invoker(InvocationMode::Bare, 77)
            .invoke(event.clone(), "req")
            .expect("bare should succeed"),
    );
    let wrapped = match invoker(InvocationMode::Wrapped, 77)
        .invoke(event, "req")
        .expect("wrapped never errors")
    {
        InvocationResponse::Wrapped(response) => response,
        InvocationResponse::Bare(_) => panic!("expected wrapped response"),
    };

    assert_eq!(wrapped.status_code, 200);
    let parsed: Envelope = serde_json::from_str(&wrapped.body).expect("body should parse");
    assert_eq!(parsed, bare_envelope);
}

#[test]
fn wrapped_response_can_feed_the_next_step() {
    let wrapped_invoker = invoker(InvocationMode::Wrapped, 5);
    let first = wrapped_invoker
        .invoke(
            json!({"path": "/payments/v1/state1", "body": initial_body()}),
            "req",
        )
        .expect("wrapped never errors");

    let second = bare(
        invoker(InvocationMode::Bare, 6)
            .invoke(
                json!({
                    "path": "/payments/v1/state2",
                    "body": serde_json::to_value(first).expect("response should serialize"),
                }),
                "req",
            )
            .expect("state2 should accept a wrapped predecessor"),
    );

    assert_eq!(second.output["state1Value"]["time"], json!(5));
    assert_eq!(second.output["state2Value"]["time"], json!(6));
}

#[test]
fn missing_body_field_is_a_500_in_wrapped_mode() {
    for body in [json!(null), json!(""), json!({"output": {}}), json!({"input": 1, "output": "x"})] {
        let response = invoker(InvocationMode::Wrapped, 1)
            .invoke(json!({"path": "/payments/v1/state1", "body": body}), "req")
            .expect("wrapped mode must not raise");

        match response {
            InvocationResponse::Wrapped(response) => {
                assert_eq!(response.status_code, 500);
                let error: Value =
                    serde_json::from_str(&response.body).expect("error body should parse");
                assert_eq!(error["error"], json!("invalid_envelope"));
            }
            InvocationResponse::Bare(_) => panic!("expected wrapped response"),
        }
    }
}

#[test]
fn unknown_step_never_succeeds() {
    for path in [
        "/payments/v1/state3",
        "/payments/v1/",
        "",
        "/payments/v1/state1x",
        "/payments/v1/state1/",
        "state1",
        "  /payments/v1/state1  ",
    ] {
        let error = invoker(InvocationMode::Bare, 1)
            .invoke(json!({"path": path, "body": initial_body()}), "req")
            .expect_err("unknown step should fault");
        assert_eq!(error.code(), "unknown_step", "path {path:?}");

        let response = invoker(InvocationMode::Wrapped, 1)
            .invoke(
                json!({"path": path, "body": {"input": 1, "output": {}}}),
                "req",
            )
            .expect("wrapped mode must not raise");
        match response {
            InvocationResponse::Wrapped(response) => {
                assert_eq!(response.status_code, 500, "path {path:?}");
                let error: Value =
                    serde_json::from_str(&response.body).expect("error body should parse");
                assert_eq!(error["error"], json!("unknown_step"));
            }
            InvocationResponse::Bare(_) => panic!("expected wrapped response"),
        }
    }
}

#[test]
fn execute_keeps_existing_keys_and_input() {
    let step = TimestampStep::new("state2");
    let context = StepContext {
        request_id: "req".to_string(),
        now_ms: 9,
    };
    let envelope = Envelope::from_value(json!({
        "input": [1, 2, 3],
        "output": {"a": 1, "b": {"nested": true}, "state2Value": "stale"}
    }))
    .expect("envelope should parse");

    let result = step
        .execute(envelope.clone(), &context)
        .expect("step should succeed");

    assert_eq!(result.input, envelope.input);
    assert_eq!(result.output["a"], envelope.output["a"]);
    assert_eq!(result.output["b"], envelope.output["b"]);
    assert_eq!(result.output["state2Value"], json!({"key": "state2", "time": 9}));
    assert_eq!(result.output.len(), 3);
}
