//! Low-allocation client for the AWS S3 v4-signed REST wire protocol.
//!
//! Targets S3-compatible object stores (MinIO, Yandex Object Storage, AWS
//! S3) with a minimal verb set: bucket existence/creation/deletion, single
//! and multipart object upload, download, delete, and listing. Credential
//! sourcing, bucket policy/ACL/tagging/versioning/lifecycle/SSE, and retry/
//! backoff are explicitly out of scope — see each module's doc comment for
//! the part of the wire protocol it owns.
#![forbid(unsafe_code)]

pub mod cancel;
pub mod client;
pub mod command;
pub mod error;
pub mod hash;
pub mod pool;
pub mod settings;
pub mod signing;
pub mod storage_file;
pub mod strbuf;
pub mod transport;
pub mod upload;
pub mod url_codec;
pub mod xml;

pub use cancel::CancellationToken;
pub use client::BucketClient;
pub use error::S3Error;
pub use settings::{Scheme, Settings};
pub use storage_file::StorageFile;
pub use transport::{HyperTransport, Transport};
pub use upload::UploadHandle;
