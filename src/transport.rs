//! The HTTP transport seam (spec.md §4.5, "OUT OF SCOPE: the underlying HTTP
//! transport... Only the contract the core consumes is specified"). One
//! default implementation is shipped, built the same way the teacher crate
//! builds its `tokio-rustls-tls` client: `hyper-util`'s legacy client over
//! `hyper-rustls`.

use async_trait::async_trait;
use http_body_util::combinators::BoxBody;
use bytes::Bytes;
use hyper::body::Incoming;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::rt::TokioExecutor;

use crate::error::S3Error;

pub type Body = BoxBody<Bytes, std::convert::Infallible>;

/// The contract `BucketClient` needs from an HTTP client: send a fully
/// formed, already-signed request and get back a response with its body
/// not yet read. Swappable so a caller who already owns a connection pool
/// (or wants to fake the network in a test) can supply their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: http::Request<Body>) -> Result<http::Response<Incoming>, S3Error>;
}

/// Default transport: `hyper-util`'s legacy client (`Client + Send + Sync`,
/// cheap to `Clone`) over `hyper-rustls` with native root certificates,
/// mirroring the teacher's `tokio-rustls-tls` feature stack exactly.
#[derive(Clone)]
pub struct HyperTransport {
    client: LegacyClient<hyper_rustls::HttpsConnector<HttpConnector>, Body>,
}

impl HyperTransport {
    /// Builds a client negotiating HTTP/1.1 only.
    pub fn new() -> Result<Self, S3Error> {
        Self::with_http2(false)
    }

    /// Builds a client that additionally offers HTTP/2 via ALPN when
    /// `use_http2` is set (no prior-knowledge `h2c`).
    pub fn with_http2(use_http2: bool) -> Result<Self, S3Error> {
        let builder = HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http();
        let connector = if use_http2 {
            builder.enable_http2().enable_http1().build()
        } else {
            builder.enable_http1().build()
        };
        let client = LegacyClient::builder(TokioExecutor::new()).build(connector);
        Ok(HyperTransport { client })
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: http::Request<Body>) -> Result<http::Response<Incoming>, S3Error> {
        Ok(self.client.request(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_http1_only_client() {
        HyperTransport::new().expect("native roots must load");
    }

    #[test]
    fn builds_http2_enabled_client() {
        HyperTransport::with_http2(true).expect("native roots must load");
    }
}
