use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::ResolverError;
use crate::extractor::SourceExtractor;
use crate::fetch::{DEFAULT_UA, Fetcher};
use crate::media::StreamCandidate;
use crate::sources::utils;

pub static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:https?://)?(?:www\.)?ppv\.(?:land|wtf|to)/").unwrap());

static EMBED_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"src\s*=\s*["'](https://www\.vidembed\.re/stream/[^"']+)["']"#).unwrap()
});
static FILE_M3U8_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"file:\s*['"]?(https?://[^"'\s]+\.m3u8)['"]?"#).unwrap()
});

const BASE_JS_URL: &str = "https://www.vidembed.re/assets/base.js?v=0.1.0";
const NOT_LIVE_MARKER: &str = "not live yet";

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    data: Option<StreamData>,
    m3u8: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamData {
    m3u8: Option<String>,
}

/// PPV Land: the stream API usually returns the `.m3u8` outright; when it
/// does not, the event page embeds a VidEmbed iframe whose player script
/// carries the real URL.
pub struct PpvLand {
    url: String,
    fetcher: Fetcher,
}

impl PpvLand {
    pub fn new(
        url: String,
        referer: Option<String>,
        cookies: Option<String>,
        client: Client,
    ) -> Self {
        let mut fetcher = Fetcher::new("PPVLand", client);
        if let Some(referer) = referer.as_deref() {
            fetcher.set_referer(referer);
        }
        if let Some(cookies) = cookies.as_deref() {
            fetcher.set_cookies_from_string(cookies);
        }
        Self { url, fetcher }
    }

    fn origin(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.host_str()
                    .map(|host| format!("{}://{host}", u.scheme()))
            })
            .unwrap_or_else(|| "https://ppv.wtf".to_string())
    }

    fn candidate_headers(&self, referer: &str) -> FxHashMap<String, String> {
        let mut headers = FxHashMap::default();
        headers.insert("User-Agent".to_string(), DEFAULT_UA.to_string());
        headers.insert("Referer".to_string(), referer.to_string());
        headers
    }

    /// Deterministic variant: `GET /api/streams/{id}` and read the explicit
    /// `m3u8` field. No guessing, so the result is trusted as-is.
    async fn direct_api(&self) -> Result<Vec<StreamCandidate>, ResolverError> {
        let stream_id = utils::last_path_segment(&self.url);
        if stream_id.is_empty() {
            return Err(ResolverError::InvalidUrl(self.url.clone()));
        }

        let api_url = format!("{}/api/streams/{stream_id}", self.origin());
        let response = self.fetcher.get(&api_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::HttpStatus {
                status,
                url: api_url,
            });
        }

        let parsed: StreamsResponse = response.json().await?;
        let m3u8 = parsed
            .data
            .and_then(|data| data.m3u8)
            .or(parsed.m3u8)
            .filter(|url| !url.trim().is_empty());

        match m3u8 {
            Some(url) => Ok(vec![
                StreamCandidate::new(url, self.candidate_headers(&self.url)).trusted(),
            ]),
            // The API answered but carries no direct link; let the embed
            // scrape variant take over.
            None => Ok(vec![]),
        }
    }

    /// Scrape variant: event page -> VidEmbed iframe -> player script scan.
    async fn embed_scrape(&self) -> Result<Vec<StreamCandidate>, ResolverError> {
        let page = self.fetcher.get_text(&self.url).await?;
        let Some(embed_url) = utils::capture_group_1(&EMBED_URL_REGEX, &page) else {
            debug!(url = %self.url, "no VidEmbed iframe on page");
            return Ok(vec![]);
        };
        let embed_url = embed_url.to_string();

        let embed_page = self
            .fetcher
            .get(&embed_url)
            .header(reqwest::header::REFERER, &self.url)
            .send()
            .await?
            .text()
            .await?;

        if embed_page.to_ascii_lowercase().contains(NOT_LIVE_MARKER) {
            debug!(%embed_url, "stream not live yet");
            return Ok(vec![]);
        }

        if let Some(m3u8) = utils::find_m3u8_url(&embed_page) {
            return Ok(vec![StreamCandidate::new(
                m3u8,
                self.candidate_headers(&embed_url),
            )]);
        }

        // The player config usually lives in base.js rather than the page.
        let base_js = self
            .fetcher
            .get(BASE_JS_URL)
            .header(reqwest::header::REFERER, &embed_url)
            .send()
            .await?
            .text()
            .await?;
        if let Some(m3u8) = utils::find_m3u8_url(&base_js)
            .or_else(|| utils::capture_group_1(&FILE_M3U8_REGEX, &base_js))
        {
            return Ok(vec![StreamCandidate::new(
                m3u8,
                self.candidate_headers(&embed_url),
            )]);
        }

        // Last resort: the VidEmbed stream API keyed by the embed id.
        let embed_id = utils::last_path_segment(&embed_url);
        let api_url = format!("https://www.vidembed.re/api/stream/{embed_id}");
        let api_body = self
            .fetcher
            .get(&api_url)
            .header(reqwest::header::REFERER, &embed_url)
            .send()
            .await?
            .text()
            .await?;
        if let Some(m3u8) = utils::find_m3u8_url(&api_body) {
            return Ok(vec![StreamCandidate::new(
                m3u8,
                self.candidate_headers(&embed_url),
            )]);
        }

        Ok(vec![])
    }
}

#[async_trait::async_trait]
impl SourceExtractor for PpvLand {
    fn name(&self) -> &'static str {
        "PPVLand"
    }

    fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    fn variants(&self) -> &'static [&'static str] {
        &["direct-api", "embed-scrape"]
    }

    async fn run_variant(&self, index: usize) -> Result<Vec<StreamCandidate>, ResolverError> {
        match index {
            0 => self.direct_api().await,
            1 => self.embed_scrape().await,
            _ => Ok(vec![]),
        }
    }
}
