//! Structured JSON log lines on stderr.
//!
//! Every line is one object: `component`, `level`, `event`, `timestamp` and a
//! free-form `details` payload. Write failures are swallowed so logging can
//! never fail an invocation.

use std::io::Write;

use serde_json::{json, Value};

pub fn log_info(component: &str, event: &str, details: Value) {
    emit(component, "info", event, details);
}

pub fn log_warn(component: &str, event: &str, details: Value) {
    emit(component, "warn", event, details);
}

pub fn log_error(component: &str, event: &str, details: Value) {
    emit(component, "error", event, details);
}

fn emit(component: &str, level: &str, event: &str, details: Value) {
    let line = log_line(component, level, event, details);
    let _ = writeln!(std::io::stderr().lock(), "{line}");
}

fn log_line(component: &str, level: &str, event: &str, details: Value) -> Value {
    json!({
        "component": component,
        "level": level,
        "event": event,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "details": details,
    })
}
