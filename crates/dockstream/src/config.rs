//! Client configuration and environment discovery.

use std::env;
use std::time::Duration;

use url::Url;

use crate::errors::{Error, Result};

/// Engine API version requested when the caller does not pin one.
pub const DEFAULT_API_VERSION: &str = "1.41";

/// Daemon address used when `DOCKER_HOST` is unset.
pub const DEFAULT_HOST: &str = "http://localhost:2375";

/// Per-request timeout applied to non-streaming calls.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Connection settings for a [`DockerClient`](crate::client::DockerClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Daemon base address, scheme included (`http://` or `https://`).
    pub host: Url,
    /// Engine API version, without a leading `v`.
    pub api_version: String,
    /// Timeout for non-streaming requests. Streaming endpoints are exempt.
    pub timeout: Duration,
    /// Extra headers attached to every request.
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Configuration for the given daemon address.
    pub fn new(host: &str) -> Result<Self> {
        Ok(Self {
            host: parse_host(host)?,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            user_agent: None,
        })
    }

    /// Configuration discovered from the process environment.
    ///
    /// Honors `DOCKER_HOST` (falling back to [`DEFAULT_HOST`]) and
    /// `DOCKER_API_VERSION`. TLS material (`DOCKER_TLS_VERIFY`,
    /// `DOCKER_CERT_PATH`) is rejected rather than silently ignored.
    pub fn from_env() -> Result<Self> {
        for var in ["DOCKER_TLS_VERIFY", "DOCKER_CERT_PATH"] {
            if env::var_os(var).is_some_and(|value| !value.is_empty()) {
                return Err(Error::Config(format!(
                    "{var} is set but TLS client configuration is not supported"
                )));
            }
        }
        let host = env::var("DOCKER_HOST").unwrap_or_default();
        let host = if host.is_empty() { DEFAULT_HOST } else { &host };
        let mut config = Self::new(host)?;
        if let Ok(version) = env::var("DOCKER_API_VERSION") {
            if !version.is_empty() {
                config.api_version = version;
            }
        }
        Ok(config)
    }

    /// Point the configuration at a different daemon address.
    pub fn set_host(&mut self, host: &str) -> Result<()> {
        self.host = parse_host(host)?;
        Ok(())
    }

    pub fn with_api_version(mut self, version: &str) -> Self {
        self.api_version = version.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Normalize a daemon address into an HTTP base URL.
///
/// `tcp://` is accepted as an alias for `http://`. Socket transports
/// (`unix://`, `npipe://`) are out of scope and rejected explicitly.
fn parse_host(host: &str) -> Result<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::Config("daemon address is empty".to_string()));
    }
    let normalized = match host.split_once("://") {
        Some(("tcp", rest)) => format!("http://{rest}"),
        Some(("http" | "https", _)) => host.to_string(),
        Some((scheme, _)) => {
            return Err(Error::Config(format!(
                "unsupported daemon address scheme {scheme}://"
            )))
        }
        None => format!("http://{host}"),
    };
    let url = Url::parse(&normalized)?;
    if url.host_str().is_none() {
        return Err(Error::Config(format!("daemon address {host} has no host")));
    }
    Ok(url)
}
