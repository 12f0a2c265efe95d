use thiserror::Error;

/// Errors produced by this crate.
///
/// Soft outcomes (object missing, bucket already exists, a multipart part
/// that didn't come back with an ETag) are plain `bool`/typed return values
/// from [`crate::client`] and [`crate::upload`] — this enum only covers
/// states that can't be expressed as a normal return.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum S3Error {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("operation attempted on a closed client or upload handle")]
    Closed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("got HTTP {status} for {verb} with body '{body}'")]
    UnexpectedStatus {
        verb: &'static str,
        status: u16,
        body: String,
    },

    #[error("hyper: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("hyper client: {0}")]
    HyperClient(#[from] hyper_util::client::legacy::Error),

    #[error("http: {0}")]
    Http(#[from] http::Error),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("invalid uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("hmac: key of invalid length: {0}")]
    HmacInvalidLength(#[from] hmac::digest::InvalidLength),

    #[error("utf8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("time format: {0}")]
    TimeFormat(#[from] time::error::Format),

    #[error("rustls: {0}")]
    Rustls(#[from] rustls::Error),
}
