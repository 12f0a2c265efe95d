//! Bucket & file operations (spec.md §4.6) — the session type applications
//! actually hold. `BucketClient` binds one `Settings` to one `Transport` and
//! dispatches every `Command` through the shared five-step signing recipe
//! from spec.md §4.5.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use log::{debug, warn};
use time::OffsetDateTime;

use crate::cancel::CancellationToken;
use crate::command::{Command, Method};
use crate::error::S3Error;
use crate::hash::{sha256_hex, EMPTY_PAYLOAD_HASH};
use crate::pool::{shared, BufferPool};
use crate::settings::Settings;
use crate::signing::Signer;
use crate::storage_file::StorageFile;
use crate::strbuf::GrowableStringBuffer;
use crate::transport::{Body, HyperTransport, Transport};
use crate::upload::{self, UploadHandle, DEFAULT_PART_SIZE};
use crate::url_codec::{append_canonical_query_with_pool, encode_key};
use crate::xml::XmlKeyScanner;

/// How often the cancellation flag is polled while a request/body transfer
/// is in flight. Coarse on purpose: this isn't meant to compete with a real
/// waker-driven cancellation primitive, just to bound how long a caller
/// waits after flipping the token.
const CANCEL_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(20);

enum TransportHandle {
    Owned(Arc<dyn Transport>),
    Shared(Arc<dyn Transport>),
}

impl TransportHandle {
    fn inner(&self) -> &Arc<dyn Transport> {
        match self {
            TransportHandle::Owned(t) | TransportHandle::Shared(t) => t,
        }
    }
}

/// One bound-to-a-bucket session. Not `Clone` — a client is a session, not
/// a value; construct it once and share it by reference (or behind an
/// `Arc` the caller owns) across tasks.
pub struct BucketClient {
    settings: Arc<Settings>,
    base_url_prefix: String,
    host_header: String,
    signer: Signer,
    transport: TransportHandle,
    closed: AtomicBool,
}

impl BucketClient {
    /// Builds a client owning its own default `HyperTransport`.
    pub fn new(settings: Settings) -> Result<Self, S3Error> {
        let transport = Arc::new(HyperTransport::with_http2(settings.use_http2)?);
        Ok(Self::build(settings, TransportHandle::Owned(transport)))
    }

    /// Builds a client over a caller-supplied transport — e.g. one shared
    /// across several `BucketClient`s pointed at different buckets on the
    /// same endpoint.
    pub fn with_transport(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        Self::build(settings, TransportHandle::Shared(transport))
    }

    fn build(settings: Settings, transport: TransportHandle) -> Self {
        let base_url_prefix = settings.bucket_url_prefix();
        let host_header = settings.host_header_value();
        let settings = Arc::new(settings);
        let signer = Signer::new(&settings);
        BucketClient {
            settings,
            base_url_prefix,
            host_header,
            signer,
            transport,
            closed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Marks the client closed. Every subsequent operation fails with
    /// `S3Error::Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn check_open(&self) -> Result<(), S3Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(S3Error::Closed);
        }
        Ok(())
    }

    fn check_cancel(cancel: Option<&CancellationToken>) -> Result<(), S3Error> {
        if cancel.map(CancellationToken::is_cancelled).unwrap_or(false) {
            return Err(S3Error::Cancelled);
        }
        Ok(())
    }

    /// `/{bucket}` or `/{bucket}/{encoded key}` — the absolute path every
    /// canonical request and every request URI is built from.
    fn object_path(&self, key: &str) -> String {
        if key.is_empty() {
            format!("/{}", self.settings.bucket)
        } else {
            format!("/{}/{}", self.settings.bucket, encode_key(key))
        }
    }

    /// Signs and sends one `Command`, returning the response headers and an
    /// un-read body wrapped in a [`StorageFile`].
    pub(crate) async fn dispatch(
        &self,
        command: &Command<'_>,
        key: &str,
        raw_query: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<StorageFile, S3Error> {
        self.check_open()?;
        Self::check_cancel(cancel)?;

        let pool = shared();
        let path = self.object_path(key);
        let now = OffsetDateTime::now_utc();
        let payload = command.payload().unwrap_or(&[]);
        let payload_hash = if payload.is_empty() {
            EMPTY_PAYLOAD_HASH.to_string()
        } else {
            sha256_hex(payload)
        };

        let mut query_buf = GrowableStringBuffer::new(pool);
        if let Some(raw_query) = raw_query {
            append_canonical_query_with_pool(&mut query_buf, raw_query, pool);
        }
        let canonical_query = query_buf.finish();

        let mut canonical_buf = GrowableStringBuffer::new(pool);
        self.signer.canonical_request(
            method_str(command.http_verb()),
            &path,
            &canonical_query,
            &self.host_header,
            &payload_hash,
            now,
            &mut canonical_buf,
        );
        let canonical_request = canonical_buf.finish();

        let mut sts_buf = GrowableStringBuffer::new(pool);
        self.signer
            .string_to_sign(now, &canonical_request, &mut sts_buf);
        let string_to_sign = sts_buf.finish();

        let signature = self.signer.sign_string(now, &string_to_sign)?;
        let authorization =
            self.signer
                .authorization_header(&self.settings.access_key, now, &signature);

        let mut url = format!("{}{}", self.base_url_prefix_host_stripped(), path);
        if !canonical_query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query);
        }

        let datetime = now
            .format(crate::signing::ISO8601_DATETIME)
            .expect("valid datetime format");

        let mut builder = http::Request::builder()
            .method(command.http_verb().as_http())
            .uri(&url)
            .header(http::header::HOST, &self.host_header)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &datetime)
            .header(http::header::AUTHORIZATION, &authorization);
        if let Some(content_type) = command.content_type() {
            builder = builder.header(http::header::CONTENT_TYPE, content_type);
        }

        let body: Body = Full::new(bytes::Bytes::copy_from_slice(payload))
            .map_err(|never: std::convert::Infallible| match never {})
            .boxed();
        let request = builder.body(body)?;

        debug!("{} {url}", command.http_verb().as_http());
        let response = self.send_with_cancel(request, cancel).await?;
        Ok(StorageFile::new(response))
    }

    /// `{scheme}://{host}[:{port}]` — the URL builder strips the bucket
    /// back off `base_url_prefix` since `object_path` already includes it,
    /// to avoid double-writing `/{bucket}` into the final URL.
    fn base_url_prefix_host_stripped(&self) -> String {
        let bucket_suffix = format!("/{}", self.settings.bucket);
        self.base_url_prefix
            .strip_suffix(&bucket_suffix)
            .unwrap_or(&self.base_url_prefix)
            .to_string()
    }

    async fn send_with_cancel(
        &self,
        request: http::Request<Body>,
        cancel: Option<&CancellationToken>,
    ) -> Result<http::Response<hyper::body::Incoming>, S3Error> {
        let transport = self.transport.inner();
        match cancel {
            None => transport.send(request).await,
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = wait_cancelled(token) => Err(S3Error::Cancelled),
                    result = transport.send(request) => result,
                }
            }
        }
    }

    // ---- spec.md §4.6 verb table ----

    pub async fn create_bucket(&self, cancel: Option<&CancellationToken>) -> Result<bool, S3Error> {
        let command = Command::CreateBucket;
        let response = self.dispatch(&command, "", None, cancel).await?;
        match response.status().as_u16() {
            200 => Ok(true),
            409 => Ok(false),
            status => Err(fatal("CreateBucket", status)),
        }
    }

    pub async fn bucket_exists(&self, cancel: Option<&CancellationToken>) -> Result<bool, S3Error> {
        let command = Command::BucketExists;
        let response = self.dispatch(&command, "", None, cancel).await?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(fatal("BucketExists", status)),
        }
    }

    pub async fn delete_bucket(&self, cancel: Option<&CancellationToken>) -> Result<bool, S3Error> {
        let command = Command::DeleteBucket;
        let response = self.dispatch(&command, "", None, cancel).await?;
        match response.status().as_u16() {
            204 => Ok(true),
            404 => Ok(false),
            status => Err(fatal("DeleteBucket", status)),
        }
    }

    pub async fn delete_file(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), S3Error> {
        let command = Command::DeleteFile;
        let response = self.dispatch(&command, name, None, cancel).await?;
        if response.status().as_u16() != 204 {
            return Err(fatal("DeleteFile", response.status().as_u16()));
        }
        Ok(())
    }

    pub async fn file_exists(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, S3Error> {
        let command = Command::FileExists;
        let response = self.dispatch(&command, name, None, cancel).await?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(fatal("FileExists", status)),
        }
    }

    pub async fn get_file(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<StorageFile, S3Error> {
        let command = Command::GetFile;
        let response = self.dispatch(&command, name, None, cancel).await?;
        match response.status().as_u16() {
            200 | 404 => Ok(response),
            status => Err(fatal("GetFile", status)),
        }
    }

    pub async fn put_file(
        &self,
        name: &str,
        content_type: &str,
        bytes: &[u8],
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, S3Error> {
        let command = Command::PutFile {
            content: bytes,
            content_type,
        };
        let response = self.dispatch(&command, name, None, cancel).await?;
        match response.status().as_u16() {
            200 => Ok(true),
            status => Err(fatal("PutFile", status)),
        }
    }

    /// Lazily yields object keys by stream-scanning the response body for
    /// `<Key>...</Key>` until exhausted.
    pub async fn list(
        &self,
        prefix: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<XmlKeyScanner<crate::storage_file::BodyStream>, S3Error> {
        let command = Command::List { prefix };
        let query = match prefix {
            Some(p) => format!("list-type=2&prefix={}", encode_key(p)),
            None => "list-type=2".to_string(),
        };
        let response = self.dispatch(&command, "", Some(&query), cancel).await?;
        if response.status().as_u16() != 200 {
            return Err(fatal("List", response.status().as_u16()));
        }
        Ok(XmlKeyScanner::new(response.body(), "Key"))
    }

    /// GET `/?uploads` — lists in-progress multipart uploads as (key,
    /// upload-id) pairs. Supplemental beyond spec.md's verb table; see
    /// SPEC_FULL.md §4.6.
    pub async fn list_multipart_uploads(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<(String, String)>, S3Error> {
        let command = Command::ListMultipartUploads;
        let response = self.dispatch(&command, "", Some("uploads"), cancel).await?;
        if response.status().as_u16() != 200 {
            return Err(fatal("ListMultipartUploads", response.status().as_u16()));
        }
        let mut body = response.body();
        let mut out = Vec::new();
        loop {
            let key = crate::xml::scan_one(&mut body, "Key").await?;
            if key.is_empty() {
                break;
            }
            let upload_id = crate::xml::scan_one(&mut body, "UploadId").await?;
            out.push((key, upload_id));
        }
        Ok(out)
    }

    /// Dispatches to a single `put_file` when the stream's length is known,
    /// non-zero, and at most one part's worth of bytes; otherwise drives the
    /// multipart engine. `part_size` is the per-part byte count for the
    /// multipart path (spec.md §4.7: "configurable, minimum 5 MiB"); `None`
    /// uses [`DEFAULT_PART_SIZE`].
    pub async fn upload_file<R: tokio::io::AsyncRead + Unpin>(
        &self,
        name: &str,
        content_type: &str,
        stream: &mut R,
        known_length: Option<u64>,
        part_size: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, S3Error> {
        use tokio::io::AsyncReadExt;

        let part_size = part_size.unwrap_or(DEFAULT_PART_SIZE).max(DEFAULT_PART_SIZE);
        let use_single_shot = matches!(known_length, Some(len) if len > 0 && len <= part_size as u64);
        if use_single_shot {
            let mut buf = Vec::with_capacity(known_length.unwrap_or(0) as usize);
            stream.read_to_end(&mut buf).await?;
            return self.put_file(name, content_type, &buf, cancel).await;
        }
        upload::upload_file(self, name, content_type, stream, part_size, cancel).await
    }

    /// Begins a multipart upload. `part_size` is the per-part byte count
    /// (spec.md §4.7: "configurable, minimum 5 MiB; default 5 MiB"); `None`
    /// uses [`DEFAULT_PART_SIZE`]. Values below `DEFAULT_PART_SIZE` are
    /// clamped up to it — S3 itself rejects smaller non-final parts.
    pub async fn begin_upload<'c>(
        &'c self,
        name: &str,
        content_type: &str,
        part_size: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> Result<UploadHandle<'c>, S3Error> {
        let part_size = part_size.unwrap_or(DEFAULT_PART_SIZE);
        UploadHandle::begin(self, name, content_type, part_size, cancel).await
    }

    /// Composes a presigned GET URL. Pure, network-free.
    pub fn build_file_url(&self, name: &str, ttl_seconds: u64) -> Result<String, S3Error> {
        let pool = shared();
        let now = OffsetDateTime::now_utc();
        let datetime = now
            .format(crate::signing::ISO8601_DATETIME)
            .expect("valid datetime format");
        let date = now
            .format(crate::signing::ISO8601_DATE)
            .expect("valid date format");

        let credential = format!(
            "{}%2F{date}%2F{}%2F{}%2Faws4_request",
            self.settings.access_key, self.settings.region, self.settings.service
        );
        let query = format!(
            "X-Amz-Algorithm=AWS4-HMAC-SHA256\
             &X-Amz-Credential={credential}\
             &X-Amz-Date={datetime}\
             &X-Amz-Expires={ttl_seconds}\
             &X-Amz-SignedHeaders=host"
        );

        let path = self.object_path(name);
        let mut canonical_buf = GrowableStringBuffer::new(pool);
        self.signer.canonical_request_presign_get(
            &path,
            &query,
            &self.host_header,
            &mut canonical_buf,
        );
        let canonical_request = canonical_buf.finish();

        let mut sts_buf = GrowableStringBuffer::new(pool);
        self.signer
            .string_to_sign(now, &canonical_request, &mut sts_buf);
        let string_to_sign = sts_buf.finish();
        let signature = self.signer.sign_string(now, &string_to_sign)?;

        Ok(format!(
            "{}{path}?{query}&X-Amz-Signature={signature}",
            self.base_url_prefix_host_stripped()
        ))
    }

    /// HEAD-gated presign: `None` when the object doesn't exist.
    pub async fn get_file_url(
        &self,
        name: &str,
        ttl_seconds: u64,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<String>, S3Error> {
        if !self.file_exists(name, cancel).await? {
            return Ok(None);
        }
        Ok(Some(self.build_file_url(name, ttl_seconds)?))
    }
}

async fn wait_cancelled(token: &CancellationToken) {
    loop {
        if token.is_cancelled() {
            return;
        }
        tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
    }
}

fn method_str(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Put => "PUT",
        Method::Post => "POST",
        Method::Head => "HEAD",
        Method::Delete => "DELETE",
    }
}

fn fatal(verb: &'static str, status: u16) -> S3Error {
    warn!("{verb} returned unexpected status {status}");
    S3Error::UnexpectedStatus {
        verb,
        status,
        body: String::new(),
    }
}
