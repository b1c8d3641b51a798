//! Proxy lifecycle management.
//!
//! Owns the listening socket and the serve task. `start` is idempotent,
//! `stop` is safe to call even if the proxy never ran, and the advertised
//! base URL uses the machine's LAN address so other local devices (cast
//! targets, second screens) can reach the proxy too.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::ProxyError;
use crate::server::{ProxyServer, ProxyServerConfig};
use crate::ticket::ProxyTicket;

struct Running {
    base_url: String,
    server: Arc<ProxyServer>,
    task: JoinHandle<()>,
}

/// Starts and stops the proxy server and mints proxied URLs against its
/// bound address.
pub struct ProxyManager {
    config: ProxyServerConfig,
    running: Mutex<Option<Running>>,
}

impl ProxyManager {
    pub fn new(config: ProxyServerConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    /// Start the proxy and return its base URL. Calling start while already
    /// running returns the existing address without rebinding.
    pub async fn start(&self) -> Result<String, ProxyError> {
        let mut running = self.running.lock().await;
        if let Some(running) = running.as_ref() {
            debug!(base_url = %running.base_url, "proxy already running");
            return Ok(running.base_url.clone());
        }

        let bind_addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        let port = listener.local_addr()?.port();
        let base_url = format!("http://{}:{port}", discover_local_ip());

        let server = Arc::new(ProxyServer::new(self.config.clone()));
        let task = {
            let server = server.clone();
            tokio::spawn(async move {
                if let Err(e) = server.run_on(listener).await {
                    error!(error = %e, "proxy server exited with error");
                }
            })
        };

        *running = Some(Running {
            base_url: base_url.clone(),
            server,
            task,
        });
        Ok(base_url)
    }

    /// Mint a proxied URL for `upstream_url` with the headers the upstream
    /// demands baked into the ticket.
    pub async fn proxy_url(
        &self,
        upstream_url: &str,
        headers: &FxHashMap<String, String>,
    ) -> Result<String, ProxyError> {
        let running = self.running.lock().await;
        let running = running.as_ref().ok_or(ProxyError::NotRunning)?;
        let ticket = ProxyTicket::new(upstream_url, headers.clone());
        Ok(format!("{}/{}", running.base_url, ticket.proxied_path()?))
    }

    /// Whether the serve task is currently alive.
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Stop the proxy and release the listening socket. A no-op if the proxy
    /// was never started.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(running) = running.take() {
            running.server.shutdown();
            if let Err(e) = running.task.await {
                warn!(error = %e, "proxy serve task did not shut down cleanly");
            }
        }
    }
}

/// Find the machine's LAN address by opening a no-traffic UDP socket toward
/// a public address and reading the chosen local endpoint. Falls back to
/// loopback, which still serves local players.
fn discover_local_ip() -> IpAddr {
    let discovered = std::net::UdpSocket::bind(("0.0.0.0", 0)).and_then(|socket| {
        socket.connect(("8.8.8.8", 80))?;
        Ok(socket.local_addr()?.ip())
    });
    match discovered {
        Ok(IpAddr::V4(ip)) if ip.is_private() => IpAddr::V4(ip),
        Ok(ip) => {
            warn!(%ip, "local address is not a private LAN address; using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Err(error) => {
            warn!(%error, "local address discovery failed; using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProxyServerConfig {
        // Port 0 so concurrent tests never collide.
        ProxyServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            ..ProxyServerConfig::default()
        }
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let manager = ProxyManager::new(test_config());
        let first = manager.start().await.unwrap();
        let second = manager.start().await.unwrap();
        assert_eq!(first, second);
        manager.stop().await;
    }

    #[tokio::test]
    async fn proxy_url_carries_a_ticket() {
        let manager = ProxyManager::new(test_config());
        let base = manager.start().await.unwrap();

        let mut headers = FxHashMap::default();
        headers.insert("Referer".to_string(), "https://embed.example/".to_string());
        let url = manager
            .proxy_url("https://cdn.example/live/index.m3u8", &headers)
            .await
            .unwrap();

        assert!(url.starts_with(&format!("{base}/index.m3u8?q=")));
        let token = url.split_once("?q=").unwrap().1;
        let ticket = ProxyTicket::decode(token).unwrap();
        assert_eq!(ticket.u, "https://cdn.example/live/index.m3u8");
        assert_eq!(ticket.h, headers);

        manager.stop().await;
    }

    #[tokio::test]
    async fn proxy_url_fails_when_not_running() {
        let manager = ProxyManager::new(test_config());
        let result = manager
            .proxy_url("https://cdn.example/x.m3u8", &FxHashMap::default())
            .await;
        assert!(matches!(result, Err(ProxyError::NotRunning)));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_noop() {
        let manager = ProxyManager::new(test_config());
        manager.stop().await;
        assert!(!manager.is_running().await);
    }

    #[tokio::test]
    async fn stop_releases_the_running_state() {
        let manager = ProxyManager::new(test_config());
        manager.start().await.unwrap();
        assert!(manager.is_running().await);
        manager.stop().await;
        assert!(!manager.is_running().await);
    }
}
