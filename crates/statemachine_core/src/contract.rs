use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::envelope::Envelope;

/// Event fields that may carry the routing path, in lookup order.
pub const ROUTING_PATH_FIELDS: [&str; 3] = ["routingPath", "path", "rawPath"];
pub const EXECUTION_ID_FIELD: &str = "executionId";

/// Uniform shape of "invoke step X with this envelope".
///
/// Produced by [`TriggerEvent::normalize`]; serializing a normalized event and
/// normalizing it again yields the same value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerEvent {
    #[serde(rename = "routingPath", default, skip_serializing_if = "Option::is_none")]
    pub routing_path: Option<String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

impl TriggerEvent {
    /// Collapses the trigger shapes seen in practice (gateway proxy events,
    /// direct Step Functions payloads, bodies sent as JSON text) into one form.
    pub fn normalize(event: Value) -> Result<Self, ValidationError> {
        let Value::Object(mut fields) = event else {
            return Err(ValidationError::new("Trigger event must be a JSON object"));
        };

        let routing_path = ROUTING_PATH_FIELDS.iter().find_map(|field| {
            fields
                .get(*field)
                .and_then(Value::as_str)
                .filter(|path| !path.trim().is_empty())
                .map(str::to_string)
        });

        let body = normalize_body(fields.remove("body").unwrap_or(Value::Null))?;
        let metadata = fields.remove("metadata").filter(|value| !value.is_null());

        Ok(Self {
            routing_path,
            body,
            metadata,
        })
    }

    pub fn envelope(&self) -> Result<Envelope, ValidationError> {
        match &self.body {
            Value::Null => Err(ValidationError::new("Request body is required")),
            body => Envelope::from_value(body.clone()),
        }
    }

    pub fn execution_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get(EXECUTION_ID_FIELD))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

fn normalize_body(body: Value) -> Result<Value, ValidationError> {
    let decoded = match body {
        Value::Null => return Ok(Value::Null),
        Value::Object(_) => body,
        Value::String(text) => {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text)
                .map_err(|error| ValidationError::new(format!("Malformed JSON body: {error}")))?
        }
        _ => return Err(ValidationError::new("Request body must be a JSON object")),
    };

    match decoded {
        Value::Object(fields) if is_wrapped_response(&fields) => {
            let inner = fields.get("body").cloned().unwrap_or(Value::Null);
            normalize_body(inner)
        }
        Value::Object(_) | Value::Null => Ok(decoded),
        _ => Err(ValidationError::new("Request body must be a JSON object")),
    }
}

/// A previous wrapped-mode response fed back in as the next step's body.
fn is_wrapped_response(fields: &Map<String, Value>) -> bool {
    !fields.contains_key("input")
        && fields.get("statusCode").is_some_and(Value::is_number)
        && fields.contains_key("body")
}

/// Step name a routing path points at: whatever follows its final `/`.
///
/// The path is taken verbatim, so `/v1/state1/`, ` /v1/state1 ` and a bare
/// `state1` name no step.
pub fn step_name_from_path(routing_path: &str) -> Option<&str> {
    let (_, name) = routing_path.rsplit_once('/')?;
    (!name.is_empty()).then_some(name)
}

/// Stable digest used to correlate the same input across separate step invocations.
pub fn input_fingerprint(input: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(input));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).unwrap_or_default()
}
