use std::collections::BTreeMap;
use std::sync::Arc;

use crate::contract::{step_name_from_path, ValidationError};
use crate::error::InvokeError;
use crate::steps::{default_steps, StepHandler};

/// Immutable name → handler map, built once at startup.
#[derive(Clone)]
pub struct StepRegistry {
    steps: BTreeMap<String, Arc<dyn StepHandler>>,
}

#[derive(Default)]
pub struct StepRegistryBuilder {
    steps: Vec<Arc<dyn StepHandler>>,
}

impl StepRegistry {
    pub fn builder() -> StepRegistryBuilder {
        StepRegistryBuilder::default()
    }

    /// The `state1` / `state2` pair deployed by every service.
    pub fn with_default_steps() -> Self {
        let steps = default_steps()
            .into_iter()
            .map(|step| {
                let handler: Arc<dyn StepHandler> = Arc::new(step);
                (handler.name().to_string(), handler)
            })
            .collect();
        Self { steps }
    }

    /// Exact match of the text after the routing path's final `/`. No prefix or fuzzy matching.
    pub fn resolve(&self, routing_path: Option<&str>) -> Result<&Arc<dyn StepHandler>, InvokeError> {
        let unknown = || InvokeError::UnknownStep {
            routing_path: routing_path.unwrap_or_default().to_string(),
        };

        let name = routing_path.and_then(step_name_from_path).ok_or_else(unknown)?;
        self.steps.get(name).ok_or_else(unknown)
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.names())
            .finish()
    }
}

impl StepRegistryBuilder {
    pub fn register(mut self, handler: impl StepHandler + 'static) -> Self {
        self.steps.push(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<StepRegistry, ValidationError> {
        let mut steps = BTreeMap::new();
        for handler in self.steps {
            let name = handler.name().to_string();
            if name.trim().is_empty() || name.contains('/') {
                return Err(ValidationError::new(format!(
                    "Step name '{name}' must be a non-empty path segment"
                )));
            }
            if steps.insert(name.clone(), handler).is_some() {
                return Err(ValidationError::new(format!(
                    "Step '{name}' is registered more than once"
                )));
            }
        }

        if steps.is_empty() {
            return Err(ValidationError::new("At least one step must be registered"));
        }

        Ok(StepRegistry { steps })
    }
}
