use std::collections::HashMap;
use std::future::Future;
use std::io::Read;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};

use super::object_store::{BlobStore, PutOptions};

/// S3 requires every part but the last to be at least 5 MiB.
pub const MULTIPART_PART_BYTES: usize = 8 * 1024 * 1024;

/// S3 bucket adapter. Calls bridge into the ambient Tokio runtime, so it must
/// be used from a multi-threaded runtime worker or a blocking thread.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl S3BlobStore {
    pub fn new(bucket: impl Into<String>, s3_client: aws_sdk_s3::Client) -> Self {
        Self {
            bucket: bucket.into(),
            s3_client,
        }
    }

    fn put(&self, key: &str, body: Vec<u8>, options: &PutOptions) -> Result<(), String> {
        let client = self.s3_client.clone();
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let content_type = options.content_type_or_default().to_string();
        let metadata = metadata_map(options);

        block_on(async move {
            client
                .put_object()
                .bucket(bucket)
                .key(object_key)
                .content_type(content_type)
                .set_metadata(metadata)
                .body(ByteStream::from(body))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to write object to s3: {error}"))
        })
    }
}

impl BlobStore for S3BlobStore {
    fn write_object(&self, key: &str, body: &[u8], options: &PutOptions) -> Result<(), String> {
        self.put(key, body.to_vec(), options)
    }

    /// Streams in `MULTIPART_PART_BYTES` parts; sources smaller than one part
    /// go up as a single `put_object`.
    fn write_stream(
        &self,
        key: &str,
        reader: &mut dyn Read,
        options: &PutOptions,
    ) -> Result<u64, String> {
        let upload = S3MultipartUpload {
            store: self,
            key,
            options,
        };
        stream_multipart(&upload, reader, MULTIPART_PART_BYTES)
    }

    fn read_object(&self, key: &str) -> Result<Option<Vec<u8>>, String> {
        let client = self.s3_client.clone();
        let bucket = self.bucket.clone();
        let object_key = key.to_string();

        block_on(async move {
            let response = match client.get_object().bucket(bucket).key(object_key).send().await {
                Ok(response) => response,
                Err(error) => {
                    if error
                        .as_service_error()
                        .is_some_and(|service_error| service_error.is_no_such_key())
                    {
                        return Ok(None);
                    }
                    return Err(format!("failed to read object from s3: {error}"));
                }
            };

            let bytes = response
                .body
                .collect()
                .await
                .map_err(|error| format!("failed to read s3 object body: {error}"))?;
            Ok(Some(bytes.into_bytes().to_vec()))
        })
    }

    fn exists(&self, key: &str) -> Result<bool, String> {
        let client = self.s3_client.clone();
        let bucket = self.bucket.clone();
        let object_key = key.to_string();

        block_on(async move {
            match client.head_object().bucket(bucket).key(object_key).send().await {
                Ok(_) => Ok(true),
                Err(error)
                    if error
                        .as_service_error()
                        .is_some_and(|service_error| service_error.is_not_found()) =>
                {
                    Ok(false)
                }
                Err(error) => Err(format!("failed to check object in s3: {error}")),
            }
        })
    }

    fn delete_object(&self, key: &str) -> Result<(), String> {
        let client = self.s3_client.clone();
        let bucket = self.bucket.clone();
        let object_key = key.to_string();

        block_on(async move {
            client
                .delete_object()
                .bucket(bucket)
                .key(object_key)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to delete object from s3: {error}"))
        })
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, String> {
        let client = self.s3_client.clone();
        let bucket = self.bucket.clone();
        let prefix = prefix.to_string();

        block_on(async move {
            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let response = client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .prefix(&prefix)
                    .set_continuation_token(continuation_token.take())
                    .send()
                    .await
                    .map_err(|error| format!("failed to list objects in s3: {error}"))?;

                keys.extend(
                    response
                        .contents()
                        .iter()
                        .filter_map(|object| object.key().map(str::to_string)),
                );

                match response.next_continuation_token() {
                    Some(token) if response.is_truncated().unwrap_or(false) => {
                        continuation_token = Some(token.to_string());
                    }
                    _ => break,
                }
            }
            keys.sort();
            Ok(keys)
        })
    }
}

/// The calls one streamed upload makes against S3.
trait MultipartTarget {
    fn put_whole(&self, body: Vec<u8>) -> Result<(), String>;
    fn start(&self) -> Result<String, String>;
    fn upload_part(&self, upload_id: &str, part_number: i32, body: Vec<u8>)
        -> Result<String, String>;
    fn complete(&self, upload_id: &str, parts: Vec<(i32, String)>) -> Result<(), String>;
    fn abort(&self, upload_id: &str) -> Result<(), String>;
}

fn stream_multipart(
    target: &impl MultipartTarget,
    reader: &mut dyn Read,
    part_size: usize,
) -> Result<u64, String> {
    let first = read_part(reader, part_size)?;
    if first.len() < part_size {
        let written = first.len() as u64;
        target.put_whole(first)?;
        return Ok(written);
    }

    let upload_id = target.start()?;
    let result = upload_parts(target, &upload_id, first, reader, part_size).and_then(
        |(parts, written)| target.complete(&upload_id, parts).map(|()| written),
    );

    result.map_err(|error| match target.abort(&upload_id) {
        Ok(()) => error,
        Err(abort_error) => format!("{error}; abort also failed: {abort_error}"),
    })
}

fn upload_parts(
    target: &impl MultipartTarget,
    upload_id: &str,
    first: Vec<u8>,
    reader: &mut dyn Read,
    part_size: usize,
) -> Result<(Vec<(i32, String)>, u64), String> {
    let mut parts = Vec::new();
    let mut written = 0u64;
    let mut part = first;
    let mut part_number = 1;

    while !part.is_empty() {
        written += part.len() as u64;
        let e_tag = target.upload_part(upload_id, part_number, part)?;
        parts.push((part_number, e_tag));
        part_number += 1;
        part = read_part(reader, part_size)?;
    }

    Ok((parts, written))
}

/// Reads up to `part_size` bytes; shorter only at end of stream.
fn read_part(reader: &mut dyn Read, part_size: usize) -> Result<Vec<u8>, String> {
    let mut part = Vec::with_capacity(part_size);
    (&mut *reader)
        .take(part_size as u64)
        .read_to_end(&mut part)
        .map_err(|error| format!("failed to read source stream: {error}"))?;
    Ok(part)
}

struct S3MultipartUpload<'a> {
    store: &'a S3BlobStore,
    key: &'a str,
    options: &'a PutOptions,
}

impl MultipartTarget for S3MultipartUpload<'_> {
    fn put_whole(&self, body: Vec<u8>) -> Result<(), String> {
        self.store.put(self.key, body, self.options)
    }

    fn start(&self) -> Result<String, String> {
        let client = self.store.s3_client.clone();
        let bucket = self.store.bucket.clone();
        let object_key = self.key.to_string();
        let content_type = self.options.content_type_or_default().to_string();
        let metadata = metadata_map(self.options);

        block_on(async move {
            let response = client
                .create_multipart_upload()
                .bucket(bucket)
                .key(object_key)
                .content_type(content_type)
                .set_metadata(metadata)
                .send()
                .await
                .map_err(|error| format!("failed to start multipart upload: {error}"))?;
            response
                .upload_id()
                .map(str::to_string)
                .ok_or_else(|| "s3 returned no multipart upload id".to_string())
        })
    }

    fn upload_part(
        &self,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String, String> {
        let client = self.store.s3_client.clone();
        let bucket = self.store.bucket.clone();
        let object_key = self.key.to_string();
        let upload_id = upload_id.to_string();

        block_on(async move {
            let response = client
                .upload_part()
                .bucket(bucket)
                .key(object_key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|error| format!("failed to upload part {part_number}: {error}"))?;
            response
                .e_tag()
                .map(str::to_string)
                .ok_or_else(|| format!("s3 returned no etag for part {part_number}"))
        })
    }

    fn complete(&self, upload_id: &str, parts: Vec<(i32, String)>) -> Result<(), String> {
        let client = self.store.s3_client.clone();
        let bucket = self.store.bucket.clone();
        let object_key = self.key.to_string();
        let upload_id = upload_id.to_string();
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .into_iter()
                    .map(|(part_number, e_tag)| {
                        CompletedPart::builder()
                            .part_number(part_number)
                            .e_tag(e_tag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        block_on(async move {
            client
                .complete_multipart_upload()
                .bucket(bucket)
                .key(object_key)
                .upload_id(upload_id)
                .multipart_upload(completed)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to complete multipart upload: {error}"))
        })
    }

    fn abort(&self, upload_id: &str) -> Result<(), String> {
        let client = self.store.s3_client.clone();
        let bucket = self.store.bucket.clone();
        let object_key = self.key.to_string();
        let upload_id = upload_id.to_string();

        block_on(async move {
            client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(object_key)
                .upload_id(upload_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to abort multipart upload: {error}"))
        })
    }
}

fn metadata_map(options: &PutOptions) -> Option<HashMap<String, String>> {
    (!options.metadata.is_empty()).then(|| {
        options
            .metadata
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    })
}

fn block_on<T>(future: impl Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
