//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler on every path
//! - Wire up middleware (request ID, tracing, timeout, concurrency limit)
//! - Bind server to listener and serve until shutdown
//! - Apply hot-reloaded upstream settings
//! - Forward GET requests upstream and reshape the answer

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, Method, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{path_and_query, request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::response::{datetime_response, ProxyError};
use crate::observability::metrics;
use crate::upstream::{extract_arrival_time, SharedUpstream, UpstreamClient, UpstreamError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<SharedUpstream>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    upstream: Arc<SharedUpstream>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, UpstreamError> {
        let client = UpstreamClient::from_config(&config.upstream, &config.timeouts)?;
        let upstream = Arc::new(SharedUpstream::new(client));

        let state = AppState {
            upstream: upstream.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            upstream,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let request_id_header = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id_header, UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configurations received on `config_updates` replace the upstream client.
    /// Returns once `shutdown` fires and in-flight requests have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        let upstream = self.upstream.clone();
        let startup_config = self.config.clone();
        let reload_task = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                if let Err(e) = apply_update(&upstream, &startup_config, &new_config) {
                    tracing::error!(error = %e, "Reloaded configuration rejected, keeping current upstream");
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reload_task.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Why a reloaded configuration was not applied.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The inbound timeout layer keeps its startup value, so it bounds the upstream timeout.
    #[error("timeouts.upstream_secs ({upstream_secs}) exceeds the running timeouts.request_secs ({request_secs})")]
    UpstreamTimeoutTooLong { upstream_secs: u64, request_secs: u64 },

    #[error(transparent)]
    Client(#[from] UpstreamError),
}

/// Swap in a client built from a reloaded configuration.
fn apply_update(
    upstream: &SharedUpstream,
    startup: &ProxyConfig,
    new_config: &ProxyConfig,
) -> Result<(), ReloadError> {
    if new_config.listener != startup.listener
        || new_config.observability != startup.observability
        || new_config.timeouts.request_secs != startup.timeouts.request_secs
    {
        tracing::warn!("Listener, observability and inbound timeout changes take effect after restart");
    }

    if new_config.timeouts.upstream_secs > startup.timeouts.request_secs {
        return Err(ReloadError::UpstreamTimeoutTooLong {
            upstream_secs: new_config.timeouts.upstream_secs,
            request_secs: startup.timeouts.request_secs,
        });
    }

    let client = UpstreamClient::from_config(&new_config.upstream, &new_config.timeouts)?;
    tracing::info!(
        upstream = %client.base_url(),
        connect_secs = new_config.timeouts.connect_secs,
        upstream_secs = new_config.timeouts.upstream_secs,
        "Upstream configuration reloaded"
    );
    upstream.store(client);
    Ok(())
}

/// Main proxy handler.
/// Fetches the upstream resource for the inbound path and reshapes it.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers);
    let target = path_and_query(&uri);

    tracing::info!(
        request_id = %request_id,
        peer = %peer,
        method = %method,
        path = %target,
        "Received request"
    );

    let response = match forward(&state, &method, target, request_id).await {
        Ok(response) => {
            tracing::info!(
                request_id = %request_id,
                status = %response.status(),
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "Request complete"
            );
            response
        }
        Err(e) => {
            match &e {
                ProxyError::UpstreamUnavailable(source) => {
                    metrics::record_upstream_failure(source.kind());
                    tracing::error!(
                        request_id = %request_id,
                        kind = source.kind(),
                        upstream_status = ?source.status(),
                        error = %source,
                        "Upstream request failed"
                    );
                }
                ProxyError::MalformedPayload(source) => {
                    metrics::record_upstream_failure("payload");
                    tracing::warn!(request_id = %request_id, error = %source, "Upstream payload rejected");
                }
                ProxyError::UnsupportedMethod(_) => {
                    tracing::warn!(request_id = %request_id, method = %method, "Unsupported method");
                }
            }
            e.into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start_time);
    response
}

/// Nothing reaches the caller until the payload has been validated.
async fn forward(
    state: &AppState,
    method: &Method,
    target: &str,
    request_id: &str,
) -> Result<Response, ProxyError> {
    if *method != Method::GET {
        return Err(ProxyError::UnsupportedMethod(method.clone()));
    }

    let upstream = state.upstream.load().fetch(target).await?;
    tracing::debug!(
        request_id = %request_id,
        url = %upstream.url,
        status = %upstream.status,
        body = %String::from_utf8_lossy(&upstream.body),
        "Upstream response"
    );

    let arrival_time = extract_arrival_time(&upstream.body)?;
    Ok(datetime_response(upstream.status, arrival_time.to_response_body()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstream.base_url = base_url.to_string();
        config
    }

    fn shared(config: &ProxyConfig) -> SharedUpstream {
        SharedUpstream::new(UpstreamClient::from_config(&config.upstream, &config.timeouts).unwrap())
    }

    #[test]
    fn reload_swaps_upstream() {
        let startup = config("http://old.example");
        let upstream = shared(&startup);

        apply_update(&upstream, &startup, &config("http://new.example")).unwrap();

        assert_eq!(upstream.load().base_url(), "http://new.example");
    }

    #[test]
    fn reload_cannot_outlast_running_request_timeout() {
        let startup = config("http://old.example");
        let upstream = shared(&startup);

        // Valid on its own, but the running timeout layer still uses the startup value.
        let mut reloaded = config("http://new.example");
        reloaded.timeouts.request_secs = 120;
        reloaded.timeouts.upstream_secs = startup.timeouts.request_secs + 30;

        let err = apply_update(&upstream, &startup, &reloaded).unwrap_err();
        assert!(matches!(
            err,
            ReloadError::UpstreamTimeoutTooLong { upstream_secs: 60, request_secs: 30 }
        ));
        assert_eq!(upstream.load().base_url(), "http://old.example");

        reloaded.timeouts.upstream_secs = startup.timeouts.request_secs;
        apply_update(&upstream, &startup, &reloaded).unwrap();
        assert_eq!(upstream.load().base_url(), "http://new.example");
    }
}
