use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use statemachine_core::contract::TriggerEvent;

use crate::adapters::download::{
    DownloadError, DownloadOptions, FileDownloadService, FileDownloader, TransferReceipt,
};
use crate::adapters::object_store::{BlobStore, PutOptions};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_url: String,
    pub destination_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl TransferRequest {
    /// Accepts the request either as the event itself or inside a gateway `body`.
    pub fn from_event(event: Value) -> Result<Self, DownloadError> {
        let payload = if event.get("body").is_some() {
            TriggerEvent::normalize(event)
                .map_err(|error| DownloadError::InvalidRequest(error.message().to_string()))?
                .body
        } else {
            event
        };

        let request: Self = serde_json::from_value(payload)
            .map_err(|error| DownloadError::InvalidRequest(format!("Malformed request: {error}")))?;

        if request.source_url.trim().is_empty() {
            return Err(DownloadError::InvalidRequest(
                "sourceUrl cannot be empty".to_string(),
            ));
        }
        Ok(request)
    }
}

pub fn handle_transfer_event<D: FileDownloader, S: BlobStore>(
    event: Value,
    service: &FileDownloadService<D, S>,
    timeout: Duration,
) -> Result<TransferReceipt, DownloadError> {
    let request = TransferRequest::from_event(event)?;

    let download_options = DownloadOptions { timeout };
    let put_options = PutOptions {
        content_type: request.content_type,
        metadata: request.metadata,
    };

    service.download(
        request.source_url.trim(),
        &request.destination_key,
        &download_options,
        &put_options,
    )
}
