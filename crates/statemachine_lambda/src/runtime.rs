use std::sync::Arc;

use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::{json, Value};
use statemachine_core::invoker::{InvocationMode, WorkflowInvoker};
use statemachine_core::logging::log_warn;
use statemachine_core::registry::StepRegistry;
use thiserror::Error;

use crate::adapters::object_store::{BlobStore, LocalBlobStore};
use crate::adapters::s3::S3BlobStore;
use crate::adapters::state_store::StateManager;
use crate::config::{ConfigError, RuntimeConfig, StorageKind};
use crate::handlers::workflow::handle_workflow_event;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open storage: {0}")]
    Storage(String),
}

pub async fn s3_client() -> aws_sdk_s3::Client {
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    aws_sdk_s3::Client::new(&aws_config)
}

/// Picks the state backend named by `STORAGE_TYPE`. AWS config is only loaded for S3.
pub async fn state_manager(config: &RuntimeConfig) -> Result<StateManager, RuntimeError> {
    let store: Box<dyn BlobStore + Send + Sync> = match config.storage {
        StorageKind::Local => Box::new(
            LocalBlobStore::new(&config.local_storage_path).map_err(RuntimeError::Storage)?,
        ),
        StorageKind::S3 => {
            let bucket = config
                .state_bucket
                .clone()
                .ok_or(ConfigError::Missing("AWS_S3_STATE_BUCKET"))?;
            Box::new(S3BlobStore::new(bucket, s3_client().await))
        }
    };

    Ok(StateManager::new(store, config.states_path.clone()))
}

pub fn workflow_invoker(mode: InvocationMode) -> WorkflowInvoker {
    WorkflowInvoker::new(Arc::new(StepRegistry::with_default_steps()), mode)
}

/// Lambda entrypoint shared by the workflow binaries; they differ only in `mode`.
///
/// Config, state store and invoker are built once per cold start. A state
/// store that cannot be opened disables checkpoints instead of the function.
pub async fn run_workflow(
    mode: InvocationMode,
    component: &str,
) -> Result<(), lambda_runtime::Error> {
    let config = RuntimeConfig::from_env()?;
    let states = match state_manager(&config).await {
        Ok(states) => Some(states),
        Err(error) => {
            log_warn(
                component,
                "checkpoints_disabled",
                json!({"error": error.to_string()}),
            );
            None
        }
    };
    let invoker = workflow_invoker(mode);

    let invoker = &invoker;
    let states = states.as_ref();
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_workflow_event(event.payload, &event.context.request_id, invoker, states)
            .map_err(lambda_runtime::Error::from)
    }))
    .await
}
