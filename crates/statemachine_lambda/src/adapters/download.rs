use std::io::Read;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;
use statemachine_core::logging::{log_error, log_info};
use statemachine_core::storage_keys::destination_object_key;
use thiserror::Error;

use super::object_store::{BlobStore, PutOptions, DEFAULT_CONTENT_TYPE};

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    pub timeout: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

/// An open response body plus what the server said about it.
pub struct DownloadedFile {
    pub content_type: Option<String>,
    pub reader: Box<dyn Read + Send>,
}

pub trait FileDownloader {
    fn download(&self, url: &str, options: &DownloadOptions) -> Result<DownloadedFile, DownloadError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("invalid transfer request: {0}")]
    InvalidRequest(String),
    #[error("failed to download file: status code {status}")]
    HttpStatus { status: u16 },
    #[error("download request failed: {0}")]
    Request(String),
    #[error("failed to store downloaded file: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferReceipt {
    pub key: String,
    pub bytes_written: u64,
    pub content_type: String,
}

/// Blocking `reqwest` client. Must not be created or dropped on an async worker thread.
#[derive(Debug, Clone)]
pub struct HttpFileDownloader {
    client: reqwest::blocking::Client,
}

impl HttpFileDownloader {
    pub fn new() -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|error| DownloadError::Request(error.to_string()))?;
        Ok(Self { client })
    }
}

impl FileDownloader for HttpFileDownloader {
    fn download(&self, url: &str, options: &DownloadOptions) -> Result<DownloadedFile, DownloadError> {
        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .map_err(|error| DownloadError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(DownloadedFile {
            content_type,
            reader: Box::new(response),
        })
    }
}

/// Pipes a remote file into the blob store, one sequential pass, no retries.
pub struct FileDownloadService<D, S> {
    downloader: D,
    store: S,
}

impl<D: FileDownloader, S: BlobStore> FileDownloadService<D, S> {
    pub fn new(downloader: D, store: S) -> Self {
        Self { downloader, store }
    }

    pub fn download(
        &self,
        url: &str,
        destination_key: &str,
        download_options: &DownloadOptions,
        put_options: &PutOptions,
    ) -> Result<TransferReceipt, DownloadError> {
        let started_at = Instant::now();
        let key = destination_object_key(destination_key)
            .map_err(|error| DownloadError::InvalidRequest(error.message().to_string()))?;

        log_info(
            "file_transfer",
            "transfer_started",
            json!({"source_url": url, "destination_key": key}),
        );

        match self.transfer(url, &key, download_options, put_options) {
            Ok(receipt) => {
                log_info(
                    "file_transfer",
                    "transfer_completed",
                    json!({
                        "source_url": url,
                        "destination_key": receipt.key,
                        "bytes_written": receipt.bytes_written,
                        "content_type": receipt.content_type,
                        "duration_ms": started_at.elapsed().as_millis(),
                    }),
                );
                Ok(receipt)
            }
            Err(error) => {
                log_error(
                    "file_transfer",
                    "transfer_failed",
                    json!({
                        "source_url": url,
                        "destination_key": key,
                        "duration_ms": started_at.elapsed().as_millis(),
                        "error": error.to_string(),
                    }),
                );
                Err(error)
            }
        }
    }

    fn transfer(
        &self,
        url: &str,
        key: &str,
        download_options: &DownloadOptions,
        put_options: &PutOptions,
    ) -> Result<TransferReceipt, DownloadError> {
        let mut file = self.downloader.download(url, download_options)?;

        let content_type = put_options
            .content_type
            .clone()
            .or(file.content_type.take())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let options = PutOptions {
            content_type: Some(content_type.clone()),
            metadata: put_options.metadata.clone(),
        };

        let bytes_written = self
            .store
            .write_stream(key, &mut file.reader, &options)
            .map_err(DownloadError::Storage)?;

        Ok(TransferReceipt {
            key: key.to_string(),
            bytes_written,
            content_type,
        })
    }
}
