//! Engine API client with streaming endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use url::Url;

use crate::config::ClientConfig;
use crate::errors::{Error, Result};
use crate::exitstack::{AsyncExitStack, ScopedResource};
use crate::models::{ImageHistoryEntry, VersionInfo};
use crate::streaming::StreamableResponse;
use crate::transport::{ChunkTransport, HttpChunkTransport};

/// Percent-encode a path segment, leaving `/` and `:` intact.
///
/// Image references legitimately contain both (`registry:5000/repo`), so
/// they pass through while everything else is escaped. Spaces become `+`.
fn path_quote(segment: &str) -> String {
    urlencoding::encode(segment)
        .replace("%2F", "/")
        .replace("%3A", ":")
        .replace("%20", "+")
}

/// Builds request URLs against a versioned API root.
pub trait FormatsVersionedUrls {
    /// Daemon base address.
    fn base_url(&self) -> &Url;

    /// API version used in request paths, without a leading `v`.
    fn api_version(&self) -> &str;

    /// Join `path` onto the versioned API root, percent-encoding `args`
    /// into each `{}` placeholder in order.
    fn format_url(&self, path: &str, args: &[&str]) -> Result<Url> {
        let mut filled = String::with_capacity(path.len());
        let mut remaining = path;
        for arg in args {
            let Some((head, tail)) = remaining.split_once("{}") else {
                return Err(Error::Config(format!(
                    "path template {path} has fewer placeholders than arguments"
                )));
            };
            filled.push_str(head);
            filled.push_str(&path_quote(arg));
            remaining = tail;
        }
        if remaining.contains("{}") {
            return Err(Error::Config(format!(
                "path template {path} has more placeholders than arguments"
            )));
        }
        filled.push_str(remaining);
        let base = self.base_url().as_str().trim_end_matches('/');
        let version = self.api_version();
        Ok(Url::parse(&format!("{base}/v{version}/{filled}"))?)
    }
}

/// Issues requests whose bodies are consumed as chunked streams.
#[async_trait]
pub trait IssuesStreamedRequests: FormatsVersionedUrls {
    fn http(&self) -> &reqwest::Client;

    /// Start a GET request lazily and wrap its body as a streamed sequence
    /// of JSON values.
    ///
    /// No timeout is applied: streaming endpoints stay open indefinitely
    /// and a request deadline would sever them mid-stream.
    fn json_stream(&self, url: Url, query: &[(String, String)]) -> StreamableResponse {
        let request = self.http().get(url).query(query);
        let pending = async move {
            let response = request.send().await.map_err(Error::Request)?;
            let response = response.error_for_status().map_err(Error::Request)?;
            Ok(Box::new(HttpChunkTransport::new(response)) as Box<dyn ChunkTransport>)
        }
        .boxed();
        StreamableResponse::new(pending)
    }
}

/// Parameters for the [`events`](DockerClient::events) stream.
#[derive(Debug, Clone, Default)]
pub struct EventsQuery {
    since: Option<i64>,
    until: Option<i64>,
    filters: BTreeMap<String, Vec<String>>,
}

impl EventsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only report events created after this Unix timestamp.
    pub fn since(mut self, timestamp: i64) -> Self {
        self.since = Some(timestamp);
        self
    }

    /// Only report events created before this Unix timestamp.
    pub fn until(mut self, timestamp: i64) -> Self {
        self.until = Some(timestamp);
        self
    }

    /// Restrict the stream by a daemon-side filter, e.g. `("type",
    /// "container")`. Repeated keys accumulate.
    pub fn filter(mut self, key: &str, value: &str) -> Self {
        self.filters
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    fn to_pairs(&self) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::new();
        if let Some(since) = self.since {
            pairs.push(("since".to_string(), since.to_string()));
        }
        if let Some(until) = self.until {
            pairs.push(("until".to_string(), until.to_string()));
        }
        if !self.filters.is_empty() {
            let encoded = serde_json::to_string(&self.filters).map_err(Error::Json)?;
            pairs.push(("filters".to_string(), encoded));
        }
        Ok(pairs)
    }
}

/// Asynchronous client for a single Docker daemon.
///
/// Owns an exit stack of adopted resources; [`close`](Self::close) releases
/// them in reverse adoption order before the client goes away.
pub struct DockerClient {
    http: reqwest::Client,
    config: ClientConfig,
    resources: AsyncExitStack,
}

impl DockerClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let http = builder.build().map_err(Error::Request)?;
        Ok(Self {
            http,
            config,
            resources: AsyncExitStack::new(),
        })
    }

    /// Client configured from `DOCKER_HOST` and related environment
    /// variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Pin the API version used in request paths.
    ///
    /// A leading `v` is stripped; versions are bare (`1.41`, not `v1.41`).
    pub fn set_api_version(&mut self, version: &str) {
        let version = match version.strip_prefix('v') {
            Some(stripped) => {
                tracing::warn!(version, "api version given with a 'v' prefix, stripping it");
                stripped
            }
            None => version,
        };
        self.config.api_version = version.to_string();
    }

    /// Point the client at a different daemon address.
    pub fn set_base_url(&mut self, host: &str) -> Result<()> {
        self.config.set_host(host)
    }

    /// Daemon base address.
    #[deprecated(note = "use `base_url`")]
    pub fn docker_host(&self) -> &Url {
        self.base_url()
    }

    /// Point the client at a different daemon address.
    #[deprecated(note = "use `set_base_url`")]
    pub fn set_docker_host(&mut self, host: &str) -> Result<()> {
        self.set_base_url(host)
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Issue a GET request and decode the complete JSON body.
    async fn query_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .http
            .get(url)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(Error::Request)?;
        let response = response.error_for_status().map_err(Error::Request)?;
        response.json().await.map_err(Error::Request)
    }

    /// Stream real-time events from the daemon.
    ///
    /// The returned response has not started the request yet; it resolves on
    /// first use and runs until the daemon closes it or the caller does.
    pub fn events(&self, query: &EventsQuery) -> Result<StreamableResponse> {
        let url = self.format_url("events", &[])?;
        Ok(self.json_stream(url, &query.to_pairs()?))
    }

    /// Build history of an image, newest layer first.
    pub async fn image_history(&self, image: &str) -> Result<Vec<ImageHistoryEntry>> {
        let url = self.format_url("images/{}/history", &[image])?;
        self.query_json(url).await
    }

    /// Version information reported by the daemon.
    pub async fn version(&self) -> Result<VersionInfo> {
        let url = self.format_url("version", &[])?;
        self.query_json(url).await
    }

    /// Tie a resource's lifetime to this client.
    ///
    /// Adopted resources are released in reverse adoption order when the
    /// client is [`close`](Self::close)d. Adoption does not resolve or enter
    /// the resource.
    pub fn adopt<R: ScopedResource + 'static>(&mut self, resource: Arc<Mutex<R>>) {
        self.resources.push_scoped(resource);
    }

    /// Release every adopted resource.
    ///
    /// Every resource gets its release attempted even when an earlier one
    /// fails; failures are collected into a single teardown error.
    pub async fn close(&mut self) -> Result<()> {
        self.resources.close().await
    }
}

impl FormatsVersionedUrls for DockerClient {
    fn base_url(&self) -> &Url {
        &self.config.host
    }

    fn api_version(&self) -> &str {
        &self.config.api_version
    }
}

impl IssuesStreamedRequests for DockerClient {
    fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
