//! Client configuration

use crate::{ClientError, Result};
use std::time::Duration;
use url::Url;

/// Default API version tag prefixed to every endpoint path
pub const DEFAULT_API_VERSION: &str = "v2";

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Server base URL (scheme and host, e.g. `https://example.cloudfs.io`)
    pub endpoint: String,
    /// API version tag (`v2`)
    pub api_version: String,
    /// Application client id, sent with the signed token request
    pub client_id: String,
    /// Application client secret used to sign the token request
    pub client_secret: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Dump request and response data to the log
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout: Duration::from_secs(60),
            user_agent: format!("cloudfs-client/{}", env!("CARGO_PKG_VERSION")),
            debug: false,
        }
    }
}

impl Config {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Read configuration from `CLOUDFS_*` environment variables.
    ///
    /// Unset variables keep their defaults. This is only ever called by the
    /// embedding application; the adapter never looks at the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("CLOUDFS_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(version) = std::env::var("CLOUDFS_API_VERSION") {
            config.api_version = version;
        }
        if let Ok(id) = std::env::var("CLOUDFS_CLIENT_ID") {
            config.client_id = id;
        }
        if let Ok(secret) = std::env::var("CLOUDFS_CLIENT_SECRET") {
            config.client_secret = secret;
        }
        if let Ok(debug) = std::env::var("CLOUDFS_DEBUG") {
            config.debug =
                matches!(debug.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        config
    }

    /// Set the application credentials used to sign the token request
    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Set the API version tag
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable request/response dumping
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Parse and check the endpoint
    pub fn validate(&self) -> Result<Url> {
        if self.endpoint.trim().is_empty() {
            return Err(ClientError::Config("endpoint must not be empty".to_string()));
        }
        let url = Url::parse(&self.endpoint).map_err(|e| {
            ClientError::Config(format!("invalid endpoint {}: {}", self.endpoint, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::Config(format!(
                "endpoint must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.api_version.trim_matches('/').is_empty() {
            return Err(ClientError::Config("api version must not be empty".to_string()));
        }
        Ok(url)
    }
}
