//! Multipart upload state machine (spec.md §4.7).
//!
//! Deliberately sequential rather than the teacher's concurrent
//! `futures::future::join_all` part-upload approach — spec.md §5 is explicit
//! that one `UploadHandle` is not safe for concurrent `add_part` calls, so
//! this borrows `&BucketClient` and owns its own scratch instead of sharing
//! anything, making the restriction structural rather than a documented
//! caution (see DESIGN.md).

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::cancel::CancellationToken;
use crate::client::BucketClient;
use crate::command::Command;
use crate::error::S3Error;

pub const DEFAULT_PART_SIZE: usize = 5 * 1024 * 1024;
pub const MAX_PART_COUNT: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadState {
    Open,
    Completed,
    Aborted,
}

/// One in-progress multipart upload. Borrows the client it was started
/// from, so it cannot outlive it and cannot be sent to another task while
/// still held here — that's what makes "not safe for concurrent calls"
/// a compile-time property rather than a documented caution.
pub struct UploadHandle<'c> {
    client: &'c BucketClient,
    key: String,
    upload_id: String,
    etags: Vec<String>,
    part_size: usize,
    state: UploadState,
}

impl<'c> UploadHandle<'c> {
    pub(crate) async fn begin(
        client: &'c BucketClient,
        key: &str,
        content_type: &str,
        part_size: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<UploadHandle<'c>, S3Error> {
        let command = Command::InitiateMultipartUpload { content_type };
        let response = client
            .dispatch(&command, key, Some("uploads"), cancel)
            .await?;
        if command.is_fatal_status(response.status().as_u16()) {
            return Err(S3Error::UnexpectedStatus {
                verb: "InitiateMultipartUpload",
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        let mut body = response.body();
        let upload_id = crate::xml::scan_one(&mut body, "UploadId").await?;
        debug!("multipart upload started key={key} upload_id={upload_id}");
        Ok(UploadHandle {
            client,
            key: key.to_string(),
            upload_id,
            etags: Vec::with_capacity(16),
            part_size: part_size.max(DEFAULT_PART_SIZE),
            state: UploadState::Open,
        })
    }

    pub fn part_count(&self) -> u32 {
        self.etags.len() as u32
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Uploads `data` as the next part (dense, 1-based part numbers). On any
    /// non-200 outcome, returns `Ok(false)` without recording an ETag — the
    /// caller is expected to call `abort` to free server-side resources.
    pub async fn add_part(
        &mut self,
        data: &[u8],
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, S3Error> {
        if self.state != UploadState::Open {
            return Err(S3Error::Closed);
        }
        if self.etags.len() as u32 >= MAX_PART_COUNT {
            warn!("multipart upload {} exceeded max part count", self.upload_id);
            return Ok(false);
        }
        let part_number = self.etags.len() as u32 + 1;
        let command = Command::UploadPart {
            upload_id: &self.upload_id,
            part_number,
            content: data,
        };
        let query = format!("partNumber={part_number}&uploadId={}", self.upload_id);
        let response = self
            .client
            .dispatch(&command, &self.key, Some(&query), cancel)
            .await?;
        if command.is_fatal_status(response.status().as_u16()) {
            warn!(
                "part {part_number} of upload {} failed with status {}",
                self.upload_id,
                response.status()
            );
            return Ok(false);
        }
        let Some(etag) = response.header(http::header::ETAG).map(str::to_string) else {
            warn!("part {part_number} of upload {} had no ETag", self.upload_id);
            return Ok(false);
        };
        self.etags.push(etag);
        debug!("uploaded part {part_number} of upload {}", self.upload_id);
        Ok(true)
    }

    /// Repeatedly fills a part-sized scratch buffer from `stream` and feeds
    /// each filled slice to `add_part`. Returns `Ok(true)` on clean EOF,
    /// `Ok(false)` at the first failed part.
    pub async fn add_parts<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut R,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, S3Error> {
        let mut scratch = vec![0u8; self.part_size];
        loop {
            let filled = read_until_full(stream, &mut scratch).await?;
            if filled == 0 {
                return Ok(true);
            }
            if !self.add_part(&scratch[..filled], cancel).await? {
                return Ok(false);
            }
            if filled < scratch.len() {
                return Ok(true);
            }
        }
    }

    /// Commits the upload. Returns `Ok(false)` immediately without sending a
    /// request if no parts were ever added.
    pub async fn complete(&mut self, cancel: Option<&CancellationToken>) -> Result<bool, S3Error> {
        if self.state != UploadState::Open {
            return Err(S3Error::Closed);
        }
        if self.etags.is_empty() {
            return Ok(false);
        }
        let pool = crate::pool::shared();
        let mut buf = crate::strbuf::GrowableStringBuffer::new(pool);
        buf.append_str("<CompleteMultipartUpload>");
        for (i, etag) in self.etags.iter().enumerate() {
            buf.append_str("<Part><PartNumber>");
            buf.append_u32(i as u32 + 1);
            buf.append_str("</PartNumber><ETag>");
            buf.append_str(etag);
            buf.append_str("</ETag></Part>");
        }
        buf.append_str("</CompleteMultipartUpload>");
        let body = buf.finish();

        let command = Command::CompleteMultipartUpload {
            upload_id: &self.upload_id,
            body: &body,
        };
        let query = format!("uploadId={}", self.upload_id);
        let response = self
            .client
            .dispatch(&command, &self.key, Some(&query), cancel)
            .await?;
        let ok = !command.is_fatal_status(response.status().as_u16());
        if ok {
            self.state = UploadState::Completed;
            debug!("completed multipart upload {}", self.upload_id);
        }
        Ok(ok)
    }

    /// Best-effort cleanup: network errors are swallowed since this is
    /// already the failure path.
    pub async fn abort(&mut self, cancel: Option<&CancellationToken>) {
        if self.state != UploadState::Open {
            return;
        }
        self.state = UploadState::Aborted;
        let command = Command::AbortMultipartUpload {
            upload_id: &self.upload_id,
        };
        let query = format!("uploadId={}", self.upload_id);
        match self
            .client
            .dispatch(&command, &self.key, Some(&query), cancel)
            .await
        {
            Ok(response) if !command.is_fatal_status(response.status().as_u16()) => {
                debug!("aborted multipart upload {}", self.upload_id);
            }
            Ok(response) => warn!(
                "abort of upload {} returned status {}",
                self.upload_id,
                response.status()
            ),
            Err(e) => warn!("abort of upload {} failed: {e}", self.upload_id),
        }
    }
}

/// Convenience: `begin_upload` → `add_parts(stream)` → `complete` on
/// success, else `abort`. Returns a single boolean.
pub async fn upload_file<R: AsyncRead + Unpin>(
    client: &BucketClient,
    key: &str,
    content_type: &str,
    stream: &mut R,
    part_size: usize,
    cancel: Option<&CancellationToken>,
) -> Result<bool, S3Error> {
    let mut handle = UploadHandle::begin(client, key, content_type, part_size, cancel).await?;
    match handle.add_parts(stream, cancel).await {
        Ok(true) => handle.complete(cancel).await,
        Ok(false) => {
            handle.abort(cancel).await;
            Ok(false)
        }
        Err(e) => {
            handle.abort(cancel).await;
            Err(e)
        }
    }
}

/// Keeps reading from `stream` until `buf` is completely full or the stream
/// returns 0 (clean EOF). Returns the number of bytes actually filled.
async fn read_until_full<R: AsyncRead + Unpin>(
    stream: &mut R,
    buf: &mut [u8],
) -> Result<usize, S3Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
