use rustc_hash::FxHashMap;

use super::Quality;

/// An unvalidated media URL produced by a resolver variant.
///
/// Immutable once created; the validator either discards it or converts it
/// into a [`ResolvedLink`](super::ResolvedLink).
#[derive(Debug, Clone)]
pub struct StreamCandidate {
    pub url: String,
    pub is_playlist: bool,
    pub quality: Quality,
    /// Headers the upstream requires on every request for this URL.
    pub headers: FxHashMap<String, String>,
    /// Trusted candidates come from a direct API response or were already
    /// probe-validated against the manifest marker; the validator accepts
    /// them without a secondary fetch.
    pub trusted: bool,
}

impl StreamCandidate {
    pub fn new(url: impl Into<String>, headers: FxHashMap<String, String>) -> Self {
        let url = url.into();
        Self {
            is_playlist: url.contains(".m3u8"),
            quality: Quality::from_url_hint(&url),
            url,
            headers,
            trusted: false,
        }
    }

    pub fn trusted(mut self) -> Self {
        self.trusted = true;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn referer(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("referer"))
            .map(|(_, value)| value.as_str())
    }
}
