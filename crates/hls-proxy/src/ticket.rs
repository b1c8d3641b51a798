//! Stateless proxy tickets.
//!
//! A ticket is the base64url-encoded JSON `{"u": url, "h": {header: value}}`
//! carried in the `q` query parameter of every proxied URL. It round-trips
//! exactly: decoding yields the original upstream URL and header set, so the
//! proxy needs no out-of-band state to service a request.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyTicket {
    /// Upstream URL to fetch on behalf of the player.
    pub u: String,
    /// Headers the upstream demands (referer, origin, cookies).
    pub h: FxHashMap<String, String>,
}

impl ProxyTicket {
    pub fn new(upstream_url: impl Into<String>, headers: FxHashMap<String, String>) -> Self {
        Self {
            u: upstream_url.into(),
            h: headers,
        }
    }

    /// Encode as a URL-safe token with no padding, suitable for a query value.
    pub fn encode(&self) -> Result<String, ProxyError> {
        let json = serde_json::to_string(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(token: &str) -> Result<Self, ProxyError> {
        // Accept padded tokens too; older encoders emit them.
        let trimmed = token.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(trimmed)
            .map_err(|_| ProxyError::InvalidTicket)?;
        serde_json::from_slice(&bytes).map_err(|_| ProxyError::InvalidTicket)
    }

    /// Last path segment of the upstream URL, used as the proxy-local file
    /// name so players see a plausible `.m3u8`/`.ts` extension.
    pub fn file_name(&self) -> &str {
        file_name_of(&self.u)
    }

    /// Proxy-local path for this ticket: `{file_name}?q={token}`.
    pub fn proxied_path(&self) -> Result<String, ProxyError> {
        Ok(format!("{}?q={}", self.file_name(), self.encode()?))
    }
}

pub(crate) fn file_name_of(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    path.rsplit('/').next().unwrap_or(path)
}
