use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::contract::ValidationError;

/// Suffix appended to a step name to form the key it owns in `output`.
pub const OUTPUT_KEY_SUFFIX: &str = "Value";

/// State threaded through every step of a workflow run.
///
/// `input` is the caller's payload and is never modified by a step. `output`
/// collects one entry per executed step. Any other top-level fields the
/// orchestrator attached are carried through untouched in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub input: Value,
    #[serde(default)]
    pub output: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Contribution written by the built-in timestamp steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepResult {
    pub key: String,
    pub time: i64,
}

impl Envelope {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            output: Map::new(),
            extra: Map::new(),
        }
    }

    /// Builds an envelope from an already-decoded trigger body.
    ///
    /// The body must be an object with an `input` field. A missing or `null`
    /// `output` starts an empty accumulation; any other non-object `output`
    /// is rejected.
    pub fn from_value(body: Value) -> Result<Self, ValidationError> {
        let Value::Object(mut fields) = body else {
            return Err(ValidationError::new("Envelope must be a JSON object"));
        };

        let Some(input) = fields.remove("input") else {
            return Err(ValidationError::new("Envelope is missing required field 'input'"));
        };

        let output = match fields.remove("output") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(output)) => output,
            Some(_) => {
                return Err(ValidationError::new(
                    "Envelope field 'output' must be a JSON object",
                ))
            }
        };

        Ok(Self {
            input,
            output,
            extra: fields,
        })
    }

    /// Shallow merge of a single step contribution. Only `key` is written.
    pub fn merge_output(&mut self, key: impl Into<String>, value: Value) {
        self.output.insert(key.into(), value);
    }

    pub fn output_keys(&self) -> impl Iterator<Item = &str> {
        self.output.keys().map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        let mut fields = self.extra.clone();
        fields.insert("input".to_string(), self.input.clone());
        fields.insert("output".to_string(), Value::Object(self.output.clone()));
        Value::Object(fields)
    }
}

pub fn output_key_for(step_name: &str) -> String {
    format!("{step_name}{OUTPUT_KEY_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_output_starts_empty() {
        let envelope = Envelope::from_value(json!({"input": {"inputFile": "input.json"}}))
            .expect("envelope should parse");

        assert_eq!(envelope.input, json!({"inputFile": "input.json"}));
        assert!(envelope.output.is_empty());
    }

    #[test]
    fn null_input_is_accepted() {
        let envelope =
            Envelope::from_value(json!({"input": null, "output": {}})).expect("null input is fine");
        assert_eq!(envelope.input, Value::Null);
    }

    #[test]
    fn rejects_missing_input() {
        let error = Envelope::from_value(json!({"output": {}})).expect_err("input is required");
        assert_eq!(error.message(), "Envelope is missing required field 'input'");
    }

    #[test]
    fn rejects_non_object_output() {
        let error = Envelope::from_value(json!({"input": 1, "output": [1, 2]}))
            .expect_err("array output should fail");
        assert!(error.message().contains("'output' must be a JSON object"));
    }

    #[test]
    fn merge_preserves_other_keys() {
        let mut envelope = Envelope::from_value(json!({
            "input": "x",
            "output": {"state1Value": {"key": "state1", "time": 1}}
        }))
        .expect("envelope should parse");

        envelope.merge_output("state2Value", json!({"key": "state2", "time": 2}));
        envelope.merge_output("state2Value", json!({"key": "state2", "time": 3}));

        assert_eq!(envelope.output.len(), 2);
        assert_eq!(envelope.output["state1Value"]["time"], json!(1));
        assert_eq!(envelope.output["state2Value"]["time"], json!(3));
    }

    #[test]
    fn extra_fields_survive_round_trip() {
        let body = json!({"input": {}, "output": {}, "executionName": "run-7"});
        let envelope = Envelope::from_value(body.clone()).expect("envelope should parse");

        assert_eq!(envelope.extra["executionName"], json!("run-7"));
        assert_eq!(envelope.to_value(), body);
        assert_eq!(
            serde_json::to_value(&envelope).expect("envelope should serialize"),
            body
        );
    }
}
