//! Proxy HTTP server.
//!
//! One handler per accepted connection; each request is serviced entirely
//! from its ticket. A malformed ticket or unreachable upstream fails that
//! request alone and never takes down the listener.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use url::Url;

use crate::error::ProxyError;
use crate::rewrite::rewrite_playlist;
use crate::ticket::ProxyTicket;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Proxy server configuration.
#[derive(Debug, Clone)]
pub struct ProxyServerConfig {
    /// Bind address; loopback is enough for a local player, the lifecycle
    /// manager binds wider so other devices on the LAN can reach it.
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Upstream connect timeout
    pub connect_timeout: Duration,
    /// Hard deadline for a whole upstream fetch
    pub request_timeout: Duration,
}

impl Default for ProxyServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 12560,
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(25),
        }
    }
}

#[derive(Clone)]
struct AppState {
    client: reqwest::Client,
    request_timeout: Duration,
}

#[derive(Deserialize)]
struct TicketQuery {
    q: String,
}

/// Proxy server.
pub struct ProxyServer {
    config: ProxyServerConfig,
    client: reqwest::Client,
    cancel_token: CancellationToken,
}

impl ProxyServer {
    pub fn new(config: ProxyServerConfig) -> Self {
        let client = match reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
        {
            Ok(client) => client,
            Err(error) => {
                warn!(%error, "proxy client build failed; falling back to defaults");
                reqwest::Client::new()
            }
        };
        Self {
            config,
            client,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            client: self.client.clone(),
            request_timeout: self.config.request_timeout,
        };

        // Players run in arbitrary origins; every response carries
        // Access-Control-Allow-Origin: *.
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(health))
            .route("/{file_name}", get(proxy_request))
            .with_state(state)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until cancelled.
    pub async fn run(&self) -> Result<(), ProxyError> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| {
                ProxyError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid bind address: {e}"),
                ))
            })?;
        let listener = TcpListener::bind(addr).await?;
        self.run_on(listener).await
    }

    /// Serve on an already-bound listener until cancelled.
    pub async fn run_on(&self, listener: TcpListener) -> Result<(), ProxyError> {
        let addr = listener.local_addr()?;
        tracing::info!("proxy server listening on http://{addr}");

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("proxy server shutting down...");
            })
            .await?;
        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

async fn health() -> &'static str {
    "proxy server is running"
}

async fn proxy_request(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    query: Result<Query<TicketQuery>, axum::extract::rejection::QueryRejection>,
    body: Bytes,
) -> Result<Response, StatusCode> {
    // GET requests carry no body here; anything else is malformed.
    if !body.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let Ok(Query(TicketQuery { q })) = query else {
        return Err(StatusCode::BAD_REQUEST);
    };
    // Decode failures get a bare 400: no internal detail leaks to the player.
    let ticket = ProxyTicket::decode(&q).map_err(|_| StatusCode::BAD_REQUEST)?;
    debug!(%file_name, upstream = %ticket.u, "proxying request");

    if let Some(local_path) = ticket.u.strip_prefix("file://") {
        return serve_local_file(local_path).await;
    }

    let upstream =
        Url::parse(&ticket.u).map_err(|_| StatusCode::BAD_REQUEST)?;

    let mut request = state.client.get(upstream.clone());
    for (name, value) in &ticket.h {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = tokio::time::timeout(state.request_timeout, request.send())
        .await
        .map_err(|_| StatusCode::GATEWAY_TIMEOUT)?
        .map_err(|error| {
            debug!(upstream = %ticket.u, %error, "upstream fetch failed");
            StatusCode::BAD_GATEWAY
        })?;

    let status = response.status();
    if file_name.ends_with(".m3u8") && status.is_success() {
        let manifest = response.text().await.map_err(|error| {
            debug!(upstream = %ticket.u, %error, "upstream body read failed");
            StatusCode::BAD_GATEWAY
        })?;
        let rewritten = rewrite_playlist(&manifest, &upstream, &ticket.h).map_err(|error| {
            debug!(upstream = %ticket.u, %error, "playlist rewrite failed");
            StatusCode::BAD_GATEWAY
        })?;
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)
            .body(Body::from(rewritten))
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR);
    }

    // Non-playlist bodies stream through unchanged.
    let mut builder = Response::builder().status(status);
    for name in [header::CONTENT_TYPE, header::CONTENT_LENGTH] {
        if let Some(value) = response.headers().get(&name) {
            builder = builder.header(name, value);
        }
    }
    builder
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn serve_local_file(path: &str) -> Result<Response, StatusCode> {
    let file = tokio::fs::File::open(path).await.map_err(|error| {
        debug!(%path, %error, "local file open failed");
        StatusCode::NOT_FOUND
    })?;
    let mut builder = Response::builder().status(StatusCode::OK);
    if let Ok(metadata) = file.metadata().await {
        builder = builder.header(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
    }
    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    fn router() -> Router {
        ProxyServer::new(ProxyServerConfig::default()).build_router()
    }

    async fn send(router: Router, uri: &str) -> Response {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router.oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn empty_path_serves_health_message() {
        let response = send(router(), "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"proxy server is running");
    }

    #[tokio::test]
    async fn missing_ticket_is_a_client_error() {
        let response = send(router(), "/index.m3u8").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn undecodable_ticket_is_a_client_error() {
        let response = send(router(), "/index.m3u8?q=%21%21not-base64%21%21").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn request_body_is_rejected() {
        let ticket = ProxyTicket::new(
            "https://cdn.example/index.m3u8",
            rustc_hash::FxHashMap::default(),
        );
        let uri = format!("/index.m3u8?q={}", ticket.encode().unwrap());
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(Body::from("unexpected"))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_bad_gateway() {
        // Nothing listens on the discard port; the connect fails fast and
        // must surface as a gateway error, not a handler panic.
        let ticket = ProxyTicket::new(
            "http://127.0.0.1:9/index.m3u8",
            rustc_hash::FxHashMap::default(),
        );
        let uri = format!("/index.m3u8?q={}", ticket.encode().unwrap());
        let response = send(router(), &uri).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn responses_allow_any_origin() {
        let response = send(router(), "/").await;
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn local_file_tickets_stream_file_bytes() {
        let dir = std::env::temp_dir().join("hls-proxy-local-file-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("clip.ts");
        tokio::fs::write(&path, b"segment-bytes").await.unwrap();

        let ticket = ProxyTicket::new(
            format!("file://{}", path.display()),
            rustc_hash::FxHashMap::default(),
        );
        let uri = format!("/clip.ts?q={}", ticket.encode().unwrap());
        let response = send(router(), &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"segment-bytes");
    }
}
