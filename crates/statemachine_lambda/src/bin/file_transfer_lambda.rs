use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use statemachine_lambda::adapters::download::{FileDownloadService, HttpFileDownloader, TransferReceipt};
use statemachine_lambda::adapters::s3::S3BlobStore;
use statemachine_lambda::config::RuntimeConfig;
use statemachine_lambda::handlers::transfer::handle_transfer_event;
use statemachine_lambda::runtime::s3_client;

async fn handle_request(
    event: LambdaEvent<Value>,
    config: &RuntimeConfig,
    s3_client: &aws_sdk_s3::Client,
) -> Result<TransferReceipt, Error> {
    let bucket = config.require_download_bucket()?.to_string();
    let store = S3BlobStore::new(bucket, s3_client.clone());
    let timeout = config.download_timeout;
    let payload = event.payload;

    // The blocking HTTP client must stay off the async worker threads.
    let receipt = tokio::task::spawn_blocking(move || {
        let service = FileDownloadService::new(HttpFileDownloader::new()?, store);
        handle_transfer_event(payload, &service, timeout)
    })
    .await
    .map_err(|error| Error::from(format!("transfer task failed: {error}")))??;

    Ok(receipt)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = RuntimeConfig::from_env()?;
    let s3_client = s3_client().await;

    let config = &config;
    let s3_client = &s3_client;
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(event, config, s3_client).await
    }))
    .await
}
