use thiserror::Error;

/// Errors produced by the proxy crate.
///
/// Per-connection failures are mapped to HTTP statuses at the handler
/// boundary; nothing here is fatal to the listener.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("ticket is not decodable")]
    InvalidTicket,

    #[error("invalid HLS playlist: {0}")]
    InvalidPlaylist(String),

    #[error("ticket encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("proxy server is not running")]
    NotRunning,
}
