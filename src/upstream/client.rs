//! Outbound HTTP client for the upstream API.
//!
//! # Responsibilities
//! - Build the outbound URL (origin + inbound path, byte-exact)
//! - Issue the GET with connect and total timeouts
//! - Treat non-2xx statuses as fetch failures
//! - Buffer the full body before anything is sent downstream

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::body::Bytes;
use axum::http::StatusCode;
use thiserror::Error;

use crate::config::{TimeoutConfig, UpstreamConfig};

/// Errors raised while talking to the upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Client could not be constructed from configuration.
    #[error("failed to build upstream client: {}", describe(.0))]
    Build(#[source] reqwest::Error),

    /// Connect, DNS, timeout, non-2xx status or body read failure.
    #[error("{}", describe(.0))]
    Request(#[source] reqwest::Error),
}

impl UpstreamError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Build(_) => "build",
            UpstreamError::Request(e) if e.is_timeout() => "timeout",
            UpstreamError::Request(e) if e.is_connect() => "connect",
            UpstreamError::Request(e) if e.is_status() => "status",
            UpstreamError::Request(_) => "request",
        }
    }

    /// Upstream status when the failure was a non-2xx answer.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Request(e) => e.status(),
            UpstreamError::Build(_) => None,
        }
    }
}

/// reqwest keeps the useful detail (refused, timed out, dns) in the source chain.
fn describe(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// A successful (2xx) upstream answer with its body fully read.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub url: String,
    pub body: Bytes,
}

/// Client bound to one upstream origin.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Build a client from configuration.
    pub fn from_config(
        upstream: &UpstreamConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.upstream_secs));

        if let Some(user_agent) = &upstream.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        if !upstream.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(UpstreamError::Build)?;

        Ok(Self {
            client,
            base_url: upstream.base_url.clone(),
        })
    }

    /// Origin requests are forwarded to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Outbound URL for an inbound path (including query string).
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    /// GET the upstream resource and buffer its body.
    pub async fn fetch(&self, path_and_query: &str) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.url_for(path_and_query);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(UpstreamError::Request)?;

        let status = response.status();
        let body = response.bytes().await.map_err(UpstreamError::Request)?;

        Ok(UpstreamResponse { status, url, body })
    }
}

/// The active upstream client, replaceable while requests are in flight.
///
/// Requests already holding the previous client finish against it.
pub struct SharedUpstream {
    current: ArcSwap<UpstreamClient>,
}

impl SharedUpstream {
    pub fn new(client: UpstreamClient) -> Self {
        Self {
            current: ArcSwap::from_pointee(client),
        }
    }

    /// Snapshot of the current client.
    pub fn load(&self) -> Arc<UpstreamClient> {
        self.current.load_full()
    }

    /// Replace the client used by subsequent requests.
    pub fn store(&self, client: UpstreamClient) {
        self.current.store(Arc::new(client));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> UpstreamClient {
        let upstream = UpstreamConfig {
            base_url: base_url.to_string(),
            ..UpstreamConfig::default()
        };
        UpstreamClient::from_config(&upstream, &TimeoutConfig::default()).unwrap()
    }

    #[test]
    fn url_is_plain_concatenation() {
        let client = client("https://api-v3.mbta.com");
        assert_eq!(
            client.url_for("/predictions?filter%5Bstop%5D=place-sstat&sort=arrival_time"),
            "https://api-v3.mbta.com/predictions?filter%5Bstop%5D=place-sstat&sort=arrival_time"
        );
        assert_eq!(client.url_for("/"), "https://api-v3.mbta.com/");
        assert_eq!(client.url_for("/a//b?x=1&x=2#"), "https://api-v3.mbta.com/a//b?x=1&x=2#");
    }

    #[test]
    fn swapping_affects_only_later_loads() {
        let shared = SharedUpstream::new(client("http://old.example"));
        let before = shared.load();

        shared.store(client("http://new.example"));

        assert_eq!(before.base_url(), "http://old.example");
        assert_eq!(shared.load().base_url(), "http://new.example");
    }
}
