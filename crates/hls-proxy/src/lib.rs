//! Local HLS-rewriting reverse proxy.
//!
//! A media player cannot attach arbitrary headers or cookies to its segment
//! requests, so resolved stream URLs are re-served through a loopback HTTP
//! server. Each proxied URL carries a self-contained [`ProxyTicket`] in its
//! query string: the upstream URL plus the headers the upstream demands.
//! Playlist responses are rewritten line by line so that every URI reference
//! points back at the proxy with a fresh ticket; everything else is streamed
//! through unchanged.
//!
//! The proxy holds no session state. A ticket decodes to everything needed
//! to service the request, so the server survives restarts and requests can
//! be handled on any connection in any order.

pub mod error;
pub mod manager;
pub mod rewrite;
pub mod server;
pub mod ticket;

pub use error::ProxyError;
pub use manager::ProxyManager;
pub use rewrite::rewrite_playlist;
pub use server::{ProxyServer, ProxyServerConfig};
pub use ticket::ProxyTicket;
