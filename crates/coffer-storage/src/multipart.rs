//! Part pump for multipart uploads.
//!
//! Reads the input in fixed-size chunks and hands each chunk to a
//! [`PartUploader`] as a numbered part. Parts are uploaded sequentially, so
//! at most one part buffer is alive at a time.

use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// S3 accepts at most this many parts per upload.
pub const MAX_PARTS: i32 = 10_000;

/// A part accepted by the server, as needed by the completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    /// Server-issued checksum for the part
    pub etag: String,
    pub size: u64,
}

/// Sink for the parts of one multipart session.
#[async_trait]
pub trait PartUploader: Send + Sync {
    /// Upload `body` as part `part_number` and return the server's checksum for it.
    async fn upload_part(&self, part_number: i32, body: Bytes) -> StorageResult<String>;
}

/// Read up to `part_size` bytes, stopping early only at end of stream.
pub async fn read_part<R>(reader: &mut R, part_size: usize) -> StorageResult<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = BytesMut::with_capacity(part_size);
    let mut limited = reader.take(part_size as u64);
    loop {
        let bytes_read = limited.read_buf(&mut buffer).await.map_err(|e| {
            StorageError::Transient(format!("Failed to read multipart chunk: {}", e))
        })?;
        if bytes_read == 0 || buffer.len() >= part_size {
            break;
        }
    }
    Ok(buffer.freeze())
}

/// Upload the whole of `reader` as parts numbered from 1 in increasing order.
///
/// Every part except possibly the last one is exactly `part_size` bytes. An
/// empty stream yields no parts.
pub async fn upload_parts<R, U>(
    reader: &mut R,
    part_size: u64,
    uploader: &U,
) -> StorageResult<Vec<UploadedPart>>
where
    R: AsyncRead + Unpin + ?Sized,
    U: PartUploader + ?Sized,
{
    if part_size == 0 {
        return Err(StorageError::Fatal(
            "multipart part size must be greater than zero".to_string(),
        ));
    }
    let part_size = usize::try_from(part_size)
        .map_err(|_| StorageError::Fatal(format!("part size {} too large", part_size)))?;

    let mut parts = Vec::new();
    let mut part_number = 1i32;

    loop {
        let chunk = read_part(reader, part_size).await?;
        if chunk.is_empty() {
            break;
        }
        if part_number > MAX_PARTS {
            return Err(StorageError::Fatal(format!(
                "multipart upload exceeds {} parts; increase the part size",
                MAX_PARTS
            )));
        }

        let size = chunk.len();
        let etag = uploader.upload_part(part_number, chunk).await?;
        parts.push(UploadedPart {
            part_number,
            etag,
            size: size as u64,
        });
        part_number += 1;

        // A short chunk means the stream ended
        if size < part_size {
            break;
        }
    }

    Ok(parts)
}
