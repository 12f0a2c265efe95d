use crate::error::S3Error;

/// URI scheme for the target object store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Immutable configuration for one [`crate::client::BucketClient`].
///
/// Constructed once with [`Settings::new`] and safe to share for the
/// client's lifetime. Credential *sourcing* (environment variables,
/// credential files, STS) is out of scope — callers that want that should
/// resolve the access/secret key themselves before calling [`Settings::new`].
#[derive(Clone, Debug)]
pub struct Settings {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub service: String,
    pub endpoint_host: String,
    pub port: Option<u16>,
    pub scheme: Scheme,
    pub bucket: String,
    pub use_http2: bool,
}

impl Settings {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        endpoint_host: impl Into<String>,
        bucket: impl Into<String>,
        scheme: Scheme,
    ) -> Result<Self, S3Error> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();
        let endpoint_host = endpoint_host.into();
        let bucket = bucket.into();

        if access_key.is_empty() {
            return Err(S3Error::InvalidSettings("access_key must not be empty".into()));
        }
        if secret_key.is_empty() {
            return Err(S3Error::InvalidSettings("secret_key must not be empty".into()));
        }
        if endpoint_host.is_empty() {
            return Err(S3Error::InvalidSettings(
                "endpoint_host must not be empty".into(),
            ));
        }
        if bucket.is_empty() {
            return Err(S3Error::InvalidSettings("bucket must not be empty".into()));
        }
        if bucket.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(S3Error::InvalidSettings(
                "bucket names must be lowercase".into(),
            ));
        }

        Ok(Settings {
            access_key,
            secret_key,
            region: "us-east-1".to_string(),
            service: "s3".to_string(),
            endpoint_host,
            port: None,
            scheme,
            bucket,
            use_http2: false,
        })
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Result<Self, S3Error> {
        let region = region.into();
        if region.is_empty() {
            return Err(S3Error::InvalidSettings("region must not be empty".into()));
        }
        self.region = region;
        Ok(self)
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Result<Self, S3Error> {
        let service = service.into();
        if service.is_empty() {
            return Err(S3Error::InvalidSettings("service must not be empty".into()));
        }
        self.service = service;
        Ok(self)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_http2(mut self, use_http2: bool) -> Self {
        self.use_http2 = use_http2;
        self
    }

    /// `{host}` or `{host}:{port}` when the port differs from the scheme's default.
    pub fn host_header_value(&self) -> String {
        match self.port {
            Some(port) if port != self.scheme.default_port() => {
                format!("{}:{}", self.endpoint_host, port)
            }
            _ => self.endpoint_host.clone(),
        }
    }

    /// `{scheme}://{host}[:{port}]/{bucket}` — the prefix every object URL is built from.
    pub fn bucket_url_prefix(&self) -> String {
        match self.port {
            Some(port) if port != self.scheme.default_port() => format!(
                "{}://{}:{}/{}",
                self.scheme.as_str(),
                self.endpoint_host,
                port,
                self.bucket
            ),
            _ => format!(
                "{}://{}/{}",
                self.scheme.as_str(),
                self.endpoint_host,
                self.bucket
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_fields() {
        assert!(Settings::new("", "secret", "host", "bucket", Scheme::Https).is_err());
        assert!(Settings::new("access", "", "host", "bucket", Scheme::Https).is_err());
        assert!(Settings::new("access", "secret", "", "bucket", Scheme::Https).is_err());
        assert!(Settings::new("access", "secret", "host", "", Scheme::Https).is_err());
    }

    #[test]
    fn rejects_uppercase_bucket() {
        assert!(Settings::new("access", "secret", "host", "BadBucket", Scheme::Https).is_err());
    }

    #[test]
    fn defaults_region_and_service() {
        let s = Settings::new("a", "s", "localhost", "b", Scheme::Http).unwrap();
        assert_eq!(s.region, "us-east-1");
        assert_eq!(s.service, "s3");
    }

    #[test]
    fn host_header_omits_default_port() {
        let s = Settings::new("a", "s", "localhost", "b", Scheme::Http)
            .unwrap()
            .with_port(80);
        assert_eq!(s.host_header_value(), "localhost");
        let s = s.with_port(5300);
        assert_eq!(s.host_header_value(), "localhost:5300");
    }

    #[test]
    fn bucket_url_prefix_shape() {
        let s = Settings::new("a", "s", "localhost", "reconfig", Scheme::Http)
            .unwrap()
            .with_port(5300);
        assert_eq!(s.bucket_url_prefix(), "http://localhost:5300/reconfig");
    }
}
