//! Response wrapper and lazy body stream (spec.md §3, §4.6).
//!
//! `StorageFile` ties the lifetime of an HTTP response to its caller: the
//! connection lease held by the underlying `hyper::body::Incoming` is only
//! released once the body (or the whole `StorageFile`) is dropped.

use std::pin::Pin;
use std::task::{Context, Poll};

use http::{HeaderMap, StatusCode};
use http_body::Body as HttpBody;
use hyper::body::{Bytes, Incoming};
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::S3Error;

/// Wraps one `get_file`/`head_file`-shaped HTTP response.
pub struct StorageFile {
    status: StatusCode,
    headers: HeaderMap,
    content_type: Option<String>,
    content_length: Option<u64>,
    body: Incoming,
}

impl StorageFile {
    pub(crate) fn new(response: http::Response<Incoming>) -> Self {
        let status = response.status();
        let (parts, body) = response.into_parts();
        let headers = parts.headers;
        let content_type = header_str(&headers, http::header::CONTENT_TYPE);
        let content_length = header_str(&headers, http::header::CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok());
        StorageFile {
            status,
            headers,
            content_type,
            content_length,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: http::HeaderName) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// `true` for a 200 response (spec.md §4.6's `get_file` success case).
    pub fn exists(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Consumes `self`, returning a stream that owns the response — closing
    /// it releases the connection back to the pool.
    pub fn body(self) -> BodyStream {
        BodyStream {
            body: self.body,
            leftover: Bytes::new(),
        }
    }
}

fn header_str(headers: &HeaderMap, name: http::HeaderName) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_owned)
}

/// An `AsyncRead` view over a response body. Frames arrive as `Bytes`
/// chunks from the underlying `hyper::body::Incoming`; any bytes left over
/// from a chunk bigger than the caller's buffer are held in `leftover`
/// until the next `poll_read`.
pub struct BodyStream {
    body: Incoming,
    leftover: Bytes,
}

impl AsyncRead for BodyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        loop {
            if !self.leftover.is_empty() {
                let n = self.leftover.len().min(buf.remaining());
                buf.put_slice(&self.leftover[..n]);
                self.leftover = self.leftover.slice(n..);
                return Poll::Ready(Ok(()));
            }

            let body = Pin::new(&mut self.body);
            match body.poll_frame(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    if let Ok(data) = frame.into_data() {
                        self.leftover = data;
                        continue;
                    }
                    // Trailers carry nothing this client reads; loop for more frames.
                    continue;
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, e)))
                }
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Reads `body` to completion into a single buffer. Used by `get_file`-style
/// callers that want the whole object in memory rather than streaming it.
pub async fn read_to_end(mut body: BodyStream) -> Result<Vec<u8>, S3Error> {
    use tokio::io::AsyncReadExt;
    let mut out = Vec::new();
    body.read_to_end(&mut out).await?;
    Ok(out)
}
