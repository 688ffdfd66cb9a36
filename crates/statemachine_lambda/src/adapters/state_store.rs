use serde_json::{Map, Value};
use statemachine_core::storage_keys::{
    state_key_from_object_key, state_listing_prefix, state_object_key,
};
use thiserror::Error;

use super::object_store::{BlobStore, PutOptions};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateStoreError {
    #[error("invalid state key: {0}")]
    InvalidKey(String),
    #[error("state '{key}' is not valid JSON: {message}")]
    Corrupt { key: String, message: String },
    #[error("partial state update must be a JSON object")]
    NonObjectUpdate,
    #[error("state storage failed: {0}")]
    Storage(String),
}

/// JSON state documents kept as `<base path>/<key>.json` objects in a blob store.
pub struct StateManager {
    store: Box<dyn BlobStore + Send + Sync>,
    base_path: String,
}

impl StateManager {
    pub fn new(store: Box<dyn BlobStore + Send + Sync>, base_path: impl Into<String>) -> Self {
        Self {
            store,
            base_path: base_path.into(),
        }
    }

    pub fn save_state(&self, key: &str, state: &Value) -> Result<(), StateStoreError> {
        let object_key = self.object_key(key)?;
        let body = serde_json::to_vec_pretty(state).map_err(|error| StateStoreError::Corrupt {
            key: key.to_string(),
            message: error.to_string(),
        })?;
        self.store
            .write_object(&object_key, &body, &PutOptions::json())
            .map_err(StateStoreError::Storage)
    }

    pub fn load_state(&self, key: &str) -> Result<Option<Value>, StateStoreError> {
        let object_key = self.object_key(key)?;
        let Some(body) = self
            .store
            .read_object(&object_key)
            .map_err(StateStoreError::Storage)?
        else {
            return Ok(None);
        };

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|error| StateStoreError::Corrupt {
                key: key.to_string(),
                message: error.to_string(),
            })
    }

    /// Existence check. Backend failures read as "absent".
    pub fn has_state(&self, key: &str) -> Result<bool, StateStoreError> {
        let object_key = self.object_key(key)?;
        Ok(self.store.exists(&object_key).unwrap_or(false))
    }

    pub fn delete_state(&self, key: &str) -> Result<(), StateStoreError> {
        if !self.has_state(key)? {
            return Ok(());
        }
        let object_key = self.object_key(key)?;
        self.store
            .delete_object(&object_key)
            .map_err(StateStoreError::Storage)
    }

    /// Shallow-merges `partial` into the stored document (or `{}`) and saves it.
    pub fn update_state(&self, key: &str, partial: &Value) -> Result<Value, StateStoreError> {
        let Value::Object(partial) = partial else {
            return Err(StateStoreError::NonObjectUpdate);
        };

        let mut merged = match self.load_state(key)? {
            Some(Value::Object(current)) => current,
            _ => Map::new(),
        };
        for (field, value) in partial {
            merged.insert(field.clone(), value.clone());
        }

        let merged = Value::Object(merged);
        self.save_state(key, &merged)?;
        Ok(merged)
    }

    pub fn list_states(&self) -> Result<Vec<String>, StateStoreError> {
        let object_keys = self
            .store
            .list_keys(&state_listing_prefix(&self.base_path))
            .map_err(StateStoreError::Storage)?;

        let mut keys: Vec<String> = object_keys
            .iter()
            .filter_map(|object_key| state_key_from_object_key(&self.base_path, object_key))
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn object_key(&self, key: &str) -> Result<String, StateStoreError> {
        state_object_key(&self.base_path, key)
            .map_err(|error| StateStoreError::InvalidKey(error.message().to_string()))
    }
}
