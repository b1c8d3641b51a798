use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::ResolverError;
use crate::extractor::SourceExtractor;
use crate::fetch::{DEFAULT_UA, Fetcher};
use crate::media::{Quality, StreamCandidate};
use crate::sources::utils;

pub static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:https?://)?(?:www\.)?strimsy\.top/").unwrap());

static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static M3U8_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[a-zA-Z0-9\-]+\.m3u8").unwrap());
static SRC_ATTR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src\s*=\s*["']([^"']+)["']"#).unwrap());
static FILE_ATTR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"file:\s*["']([^"']+)["']"#).unwrap());

const BASE_URL: &str = "https://strimsy.top";
const CDN_BASE: &str = "https://ve16o28z6o6dszgkty3jni6ulo3ba9jt.global.ssl.fastly.net";

// Event pages nest two iframes: the site-local /live/ player and inside it
// the external embed host.
const MAX_IFRAME_HOPS: usize = 2;

/// Strimsy: embedded players behind a chain of iframes, with the stream URL
/// hidden in inline (often packed) scripts; as a fallback the fragment CDN
/// path can be reconstructed from the page's stream id.
pub struct Strimsy {
    url: String,
    fetcher: Fetcher,
}

impl Strimsy {
    pub fn new(
        url: String,
        referer: Option<String>,
        cookies: Option<String>,
        client: Client,
    ) -> Self {
        let mut fetcher = Fetcher::new("Strimsy", client);
        fetcher.set_origin(BASE_URL);
        fetcher.set_referer(referer.as_deref().unwrap_or(BASE_URL));
        if let Some(cookies) = cookies.as_deref() {
            fetcher.set_cookies_from_string(cookies);
        }
        Self { url, fetcher }
    }

    fn candidate_headers(&self, referer: &str) -> FxHashMap<String, String> {
        let mut headers = FxHashMap::default();
        headers.insert("User-Agent".to_string(), DEFAULT_UA.to_string());
        headers.insert("Referer".to_string(), referer.to_string());
        headers.insert("Origin".to_string(), BASE_URL.to_string());
        headers
    }

    /// Walk the iframe chain, scanning every hop's scripts for a stream URL.
    async fn embed_scrape(&self) -> Result<Vec<StreamCandidate>, ResolverError> {
        let mut page_url = self.url.clone();
        let mut body = self.fetcher.get_text(&page_url).await?;

        for _ in 0..=MAX_IFRAME_HOPS {
            if let Some(stream_url) = scan_scripts_for_stream(&body) {
                return Ok(vec![StreamCandidate::new(
                    stream_url,
                    self.candidate_headers(&page_url),
                )]);
            }

            let Some(iframe_src) = utils::find_iframe_src(&body) else {
                break;
            };
            let iframe_url = utils::fix_url(BASE_URL, iframe_src);

            let response = self
                .fetcher
                .get(&iframe_url)
                .header(reqwest::header::REFERER, &page_url)
                .send()
                .await?;

            // Some embeds redirect straight to the playlist.
            let final_url = response.url().to_string();
            if final_url.contains(".m3u8") {
                return Ok(vec![StreamCandidate::new(
                    final_url,
                    self.candidate_headers(&iframe_url),
                )]);
            }

            body = response.text().await?;
            page_url = iframe_url;
        }

        debug!(url = %self.url, "no stream url in iframe chain");
        Ok(vec![])
    }

    /// Reconstruct plausible fragment-CDN URLs from the page's stream id and
    /// probe them in order until one serves a real manifest.
    async fn cdn_probe(&self) -> Result<Vec<StreamCandidate>, ResolverError> {
        let page = self.fetcher.get_text(&self.url).await?;
        let Some(stream_id) = UUID_REGEX.find(&page).map(|m| m.as_str()) else {
            debug!(url = %self.url, "no stream id on page");
            return Ok(vec![]);
        };

        let api_url = format!("{}?type=live", self.url);
        let api_body = self.fetcher.get_text(&api_url).await?;
        let Some(m3u8_path) = M3U8_PATH_REGEX.find(&api_body).map(|m| m.as_str()) else {
            debug!(url = %self.url, "no m3u8 path in live response");
            return Ok(vec![]);
        };

        let urls = probe_urls(stream_id, m3u8_path);
        let Some((url, manifest)) = utils::probe_first_manifest(&self.fetcher, &urls).await else {
            return Ok(vec![]);
        };

        let mut candidate =
            StreamCandidate::new(url, self.candidate_headers(&self.url)).trusted();
        if let Some(quality) = Quality::from_manifest(manifest.as_bytes()) {
            candidate = candidate.with_quality(quality);
        }
        Ok(vec![candidate])
    }
}

/// Ordered CDN URL templates for a given stream id and playlist path.
fn probe_urls(stream_id: &str, m3u8_path: &str) -> Vec<String> {
    vec![
        format!("{CDN_BASE}/v3/fragment/{stream_id}/tracks-v1a1{m3u8_path}"),
        format!("{CDN_BASE}/v3/fragment/{stream_id}/tracks-v1{m3u8_path}"),
        format!("{CDN_BASE}/v3/fragment/{stream_id}{m3u8_path}"),
    ]
}

/// Scan inline scripts for a playable URL, unpacking packed blocks first.
fn scan_scripts_for_stream(body: &str) -> Option<String> {
    if let Some(url) = utils::find_m3u8_url(body) {
        return Some(url.to_string());
    }

    if body.contains("eval(")
        && let Some(unpacked) = utils::unpack_packed_js(body)
    {
        if let Some(url) = utils::find_m3u8_url(&unpacked) {
            return Some(url.to_string());
        }
        for re in [&*SRC_ATTR_REGEX, &*FILE_ATTR_REGEX] {
            if let Some(url) = utils::capture_group_1(re, &unpacked)
                && url.contains(".m3u8")
            {
                return Some(url.to_string());
            }
        }
    }

    if let Some(url) = utils::capture_group_1(&FILE_ATTR_REGEX, body)
        && url.contains(".m3u8")
    {
        return Some(url.to_string());
    }

    None
}

#[async_trait::async_trait]
impl SourceExtractor for Strimsy {
    fn name(&self) -> &'static str {
        "Strimsy"
    }

    fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    fn variants(&self) -> &'static [&'static str] {
        &["embed-scrape", "cdn-probe"]
    }

    async fn run_variant(&self, index: usize) -> Result<Vec<StreamCandidate>, ResolverError> {
        match index {
            0 => self.embed_scrape().await,
            1 => self.cdn_probe().await,
            _ => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_url_order_is_fixed() {
        let urls = probe_urls("977b47d5-ec7c-4211-a25d-bfb1f579c6aa", "/abc-def.m3u8");
        assert_eq!(urls.len(), 3);
        assert!(urls[0].contains("/tracks-v1a1/abc-def.m3u8"));
        assert!(urls[1].contains("/tracks-v1/abc-def.m3u8"));
        assert!(urls[2].ends_with("977b47d5-ec7c-4211-a25d-bfb1f579c6aa/abc-def.m3u8"));
    }

    #[test]
    fn script_scan_finds_plain_url() {
        let body = r#"<script>player.src = "https://cdn.example/live/idx.m3u8";</script>"#;
        assert_eq!(
            scan_scripts_for_stream(body).as_deref(),
            Some("https://cdn.example/live/idx.m3u8")
        );
    }

    #[test]
    fn script_scan_unpacks_before_scanning() {
        let body = r#"<script>eval(function(p,a,c,k,e,d){while(c--){if(k[c]){p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c])}}return p}('0 1="2://3.4/5.6"',10,7,'var|src|https|cdn|example|index|m3u8'.split('|'),0,{}))</script>"#;
        assert_eq!(
            scan_scripts_for_stream(body).as_deref(),
            Some("https://cdn.example/index.m3u8")
        );
    }

    #[test]
    fn uuid_and_path_scan() {
        let page = "stream id 977b47d5-ec7c-4211-a25d-bfb1f579c6aa here";
        assert!(UUID_REGEX.is_match(page));
        let api = r#"{"playlist":"/abc-123.m3u8"}"#;
        assert_eq!(
            M3U8_PATH_REGEX.find(api).map(|m| m.as_str()),
            Some("/abc-123.m3u8")
        );
    }
}
