use std::fmt;

use reqwest::Client;
use tracing::debug;

use crate::media::{Quality, ResolvedLink, StreamCandidate};

const HLS_MARKER: &str = "#EXTM3U";

/// Why a candidate was dropped. Rejections are logged, never propagated:
/// one bad candidate must not abort resolution while others remain untried.
#[derive(Debug)]
pub struct Rejection {
    pub url: String,
    pub reason: String,
}

impl Rejection {
    fn new(url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.reason)
    }
}

/// Confirms a candidate points at a live, parseable manifest.
///
/// Trusted candidates (direct API answers, probe-validated URLs) pass
/// without a network round trip; everything else must serve a 2xx response
/// whose body starts with the HLS marker or whose content type names a
/// playlist.
pub struct LinkValidator {
    client: Client,
}

impl LinkValidator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn validate(&self, candidate: StreamCandidate) -> Result<ResolvedLink, Rejection> {
        if candidate.trusted {
            return Ok(ResolvedLink::from_candidate(candidate));
        }
        if !candidate.is_playlist {
            // Direct media files carry no manifest to check; accept and let
            // the player decide.
            return Ok(ResolvedLink::from_candidate(candidate));
        }

        let mut request = self.client.get(&candidate.url);
        for (name, value) in &candidate.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Rejection::new(&candidate.url, format!("fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Rejection::new(&candidate.url, format!("HTTP {status}")));
        }

        let is_playlist_content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("mpegurl"));

        let body = response
            .bytes()
            .await
            .map_err(|e| Rejection::new(&candidate.url, format!("body read failed: {e}")))?;

        let has_marker = body.trim_ascii_start().starts_with(HLS_MARKER.as_bytes());
        if !has_marker && !is_playlist_content_type {
            return Err(Rejection::new(&candidate.url, "not a media playlist"));
        }

        let mut candidate = candidate;
        if let Some(quality) = Quality::from_manifest(&body)
            && quality > candidate.quality
        {
            debug!(url = %candidate.url, %quality, "quality upgraded from manifest");
            candidate.quality = quality;
        }

        Ok(ResolvedLink::from_candidate(candidate))
    }
}
