//! S3-compatible object storage backend.
//!
//! `put` reads the whole body into memory and sends it with a known
//! content length. The transfer layer only routes bodies with a known size
//! under the multipart threshold here; larger or unsized bodies go through
//! `multipart_put`, which keeps one part buffer alive at a time.

use crate::multipart::{upload_parts, PartUploader};
use crate::traits::{BlobReader, BlobStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coffer_core::{Blob, ByteRange, ErrorKind, Metadata};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

/// Connection settings for [`S3Storage::new`].
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, R2, etc.)
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    closed: Arc<AtomicBool>,
}

/// Where in the request lifecycle an SDK call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    /// The request could not be built
    Construction,
    /// Timeout or connection failure before a response arrived
    Transport,
    /// The service answered with an error
    Response,
}

/// Classify a remote failure from its service error code and HTTP status.
pub fn classify(code: Option<&str>, status: Option<u16>, source: FailureSource) -> ErrorKind {
    match source {
        FailureSource::Construction => return ErrorKind::Fatal,
        FailureSource::Transport => return ErrorKind::Transient,
        FailureSource::Response => {}
    }

    let code = code.unwrap_or_default().to_ascii_lowercase();
    match code.as_str() {
        "nosuchkey" | "notfound" | "nosuchupload" => return ErrorKind::NotFound,
        "invalidrange" => return ErrorKind::InvalidInput,
        "slowdown" | "throttling" | "throttlingexception" | "requesttimeout"
        | "internalerror" | "serviceunavailable" => return ErrorKind::Transient,
        "accessdenied" | "invalidaccesskeyid" | "signaturedoesnotmatch" | "nosuchbucket"
        | "authorizationheadermalformed" => return ErrorKind::Config,
        _ => {}
    }

    match status {
        Some(404) => ErrorKind::NotFound,
        Some(416) => ErrorKind::InvalidInput,
        Some(401) | Some(403) => ErrorKind::Config,
        Some(408) | Some(429) => ErrorKind::Transient,
        Some(s) if s >= 500 => ErrorKind::Transient,
        _ => ErrorKind::Fatal,
    }
}

fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, key: &str) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let source = match &err {
        SdkError::ConstructionFailure(_) => FailureSource::Construction,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => FailureSource::Transport,
        _ => FailureSource::Response,
    };
    let status = err.raw_response().map(|r| r.status().as_u16());
    let kind = classify(err.code(), status, source);
    let detail = match err.message() {
        Some(message) => format!("{}: {}", key, message),
        None => format!("{}: {}", key, DisplayErrorContext(&err)),
    };

    match kind {
        ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
        ErrorKind::InvalidInput => StorageError::InvalidRange(detail),
        other => StorageError::from_kind(other, detail),
    }
}

/// `Range` header value for an inclusive byte range.
pub fn range_header(range: &ByteRange) -> String {
    match range.end {
        Some(end) => format!("bytes={}-{}", range.start, end),
        None => format!("bytes={}-", range.start),
    }
}

/// Total object size from a `Content-Range` value like `bytes 0-9/26`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Strip the quotes S3 wraps around ETags.
pub fn normalize_etag(etag: Option<&str>) -> String {
    etag.unwrap_or_default().trim_matches('"').to_string()
}

/// Blob description built from a write response alone.
fn committed_blob(
    key: &str,
    size: u64,
    etag: Option<&str>,
    content_type: Option<&str>,
    metadata: &Metadata,
) -> Blob {
    Blob {
        key: key.to_string(),
        size,
        etag: normalize_etag(etag),
        content_type: content_type.map(String::from),
        last_modified: Utc::now(),
        metadata: metadata.clone(),
    }
}

fn to_chrono(timestamp: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    timestamp
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now)
}

fn to_metadata(raw: Option<&HashMap<String, String>>) -> Metadata {
    raw.map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

struct S3PartUploader<'a> {
    client: &'a Client,
    bucket: &'a str,
    key: &'a str,
    upload_id: &'a str,
}

#[async_trait]
impl PartUploader for S3PartUploader<'_> {
    async fn upload_part(&self, part_number: i32, body: Bytes) -> StorageResult<String> {
        let size = body.len();
        let result = self
            .client
            .upload_part()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(self.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %self.key,
                    part_number = part_number,
                    size_bytes = size,
                    "Failed to upload part"
                );
                map_sdk_error(e, self.key)
            })?;

        result
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| StorageError::Fatal(format!("No ETag returned for part {}", part_number)))
    }
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// With a custom endpoint the client uses path-style addressing, which
    /// MinIO and R2 require. Static credentials are used when both halves are
    /// configured; otherwise the default AWS provider chain applies.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::ConfigError("S3 bucket is required".to_string()));
        }

        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(config.region.clone()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone());

        match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "coffer",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(StorageError::ConfigError(
                    "S3 access key id and secret access key must be set together".to_string(),
                ))
            }
        }

        let sdk_config = loader.load().await;

        let client = if let Some(ref endpoint) = config.endpoint_url {
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .endpoint_url(endpoint)
                .retry_config(retry_config)
                .force_path_style(true)
                .build();
            Client::from_conf(s3_config)
        } else {
            Client::new(&sdk_config)
        };

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint_url,
            "S3 storage initialized"
        );

        Ok(S3Storage {
            client,
            bucket: config.bucket,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Fatal("storage has been closed".to_string()))
        } else {
            Ok(())
        }
    }

    async fn put_bytes(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        metadata: &Metadata,
    ) -> StorageResult<Blob> {
        let start = std::time::Instant::now();
        let size = data.len() as u64;

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .set_content_type(content_type.map(String::from))
            .set_metadata(Some(metadata.clone().into_iter().collect()))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                map_sdk_error(e, key)
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        let written = committed_blob(key, size, output.e_tag(), content_type, metadata);
        Ok(self.confirm_committed(written).await)
    }

    /// Prefer the server's view of a committed object but never fail on it.
    ///
    /// The object already exists once PutObject or CompleteMultipartUpload
    /// returns, so a HEAD failure only costs the server-side timestamp.
    async fn confirm_committed(&self, written: Blob) -> Blob {
        match self.stat(&written.key).await {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %written.key,
                    "Stat after committed write failed; using write response"
                );
                written
            }
        }
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            tracing::warn!(
                error = %DisplayErrorContext(&e),
                bucket = %self.bucket,
                key = %key,
                upload_id = %upload_id,
                "Failed to abort multipart upload"
            );
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(
        &self,
        key: &str,
        mut reader: BlobReader,
        size_hint: Option<u64>,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StorageResult<Blob> {
        self.ensure_open()?;

        let mut buffer = Vec::with_capacity(size_hint.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::Transient(format!("Failed to read from stream: {}", e))
        })?;

        self.put_bytes(key, Bytes::from(buffer), content_type, &metadata)
            .await
    }

    async fn multipart_put(
        &self,
        key: &str,
        mut reader: BlobReader,
        part_size: u64,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StorageResult<Blob> {
        self.ensure_open()?;
        let start = std::time::Instant::now();

        let create_result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(String::from))
            .set_metadata(Some(metadata.clone().into_iter().collect()))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to create multipart upload"
                );
                map_sdk_error(e, key)
            })?;

        let upload_id = create_result
            .upload_id()
            .ok_or_else(|| StorageError::Fatal("No upload ID returned from S3".to_string()))?
            .to_string();

        let uploader = S3PartUploader {
            client: &self.client,
            bucket: &self.bucket,
            key,
            upload_id: &upload_id,
        };

        let parts = match upload_parts(&mut reader, part_size, &uploader).await {
            Ok(parts) => parts,
            Err(e) => {
                self.abort_multipart(key, &upload_id).await;
                return Err(e);
            }
        };

        if parts.is_empty() {
            // S3 cannot complete an upload with zero parts
            self.abort_multipart(key, &upload_id).await;
            return self
                .put_bytes(key, Bytes::new(), content_type, &metadata)
                .await;
        }

        let part_count = parts.len();
        let total_size: u64 = parts.iter().map(|p| p.size).sum();
        let completed_parts = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .into_iter()
                    .map(|p| {
                        CompletedPart::builder()
                            .part_number(p.part_number)
                            .e_tag(p.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed_parts)
            .send()
            .await;

        let completed = match completed {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to complete multipart upload"
                );
                self.abort_multipart(key, &upload_id).await;
                return Err(map_sdk_error(e, key));
            }
        };

        let written = committed_blob(key, total_size, completed.e_tag(), content_type, &metadata);
        let blob = self.confirm_committed(written).await;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = blob.size,
            parts = part_count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload successful"
        );

        Ok(blob)
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> StorageResult<(Blob, BlobStream)> {
        self.ensure_open()?;
        let start = std::time::Instant::now();

        if let Some(range) = &range {
            if range.end.is_some_and(|end| end < range.start) {
                return Err(StorageError::InvalidRange(format!("{} for {}", range, key)));
            }
        }

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range.as_ref().map(range_header))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        let transferred = response.content_length().unwrap_or_default().max(0) as u64;
        let size = response
            .content_range()
            .and_then(parse_content_range_total)
            .unwrap_or(transferred);

        let blob = Blob {
            key: key.to_string(),
            size,
            etag: normalize_etag(response.e_tag()),
            content_type: response.content_type().map(String::from),
            last_modified: to_chrono(response.last_modified()),
            metadata: to_metadata(response.metadata()),
        };

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = transferred,
            range = ?range.map(|r| r.to_string()),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download started"
        );

        let bucket = self.bucket.clone();
        let stream_key = key.to_string();
        let stream = ReaderStream::new(response.body.into_async_read()).map(move |item| {
            item.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %stream_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream download error"
                );
                StorageError::Transient(format!("{}: {}", stream_key, e))
            })
        });

        Ok((blob, Box::pin(stream)))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<Blob>> {
        self.ensure_open()?;

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut blobs = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| map_sdk_error(e, prefix))?;
            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                blobs.push(Blob {
                    key: key.to_string(),
                    size: object.size().unwrap_or_default().max(0) as u64,
                    etag: normalize_etag(object.e_tag()),
                    content_type: None,
                    last_modified: to_chrono(object.last_modified()),
                    metadata: Metadata::new(),
                });
            }
        }

        // ListObjectsV2 already returns UTF-8 binary order; sorting keeps providers honest
        blobs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(blobs)
    }

    async fn stat(&self, key: &str) -> StorageResult<Blob> {
        self.ensure_open()?;

        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(Blob {
            key: key.to_string(),
            size: head.content_length().unwrap_or_default().max(0) as u64,
            etag: normalize_etag(head.e_tag()),
            content_type: head.content_type().map(String::from),
            last_modified: to_chrono(head.last_modified()),
            metadata: to_metadata(head.metadata()),
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.ensure_open()?;
        let start = std::time::Instant::now();

        // DeleteObject succeeds for missing keys, so existence is checked first
        self.stat(key).await?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                map_sdk_error(e, key)
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
