use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::ResolverError;
use crate::extractor::SourceExtractor;
use crate::fetch::{DEFAULT_UA, Fetcher};
use crate::media::StreamCandidate;
use crate::sources::utils;

pub static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:https?://)?(?:www\.)?streambtw\.com/").unwrap());

const BASE_URL: &str = "https://streambtw.com";

/// StreamBTW: the playlist URL sits in plain sight in the page HTML or in
/// one of its iframes.
pub struct StreamBtw {
    url: String,
    fetcher: Fetcher,
}

impl StreamBtw {
    pub fn new(
        url: String,
        referer: Option<String>,
        cookies: Option<String>,
        client: Client,
    ) -> Self {
        let mut fetcher = Fetcher::new("StreamBTW", client);
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
        headers
    }

    async fn page_scan(&self) -> Result<Vec<StreamCandidate>, ResolverError> {
        let page = self.fetcher.get_text(&self.url).await?;
        match utils::find_m3u8_url(&page) {
            Some(m3u8) => Ok(vec![StreamCandidate::new(
                m3u8,
                self.candidate_headers(&self.url),
            )]),
            None => Ok(vec![]),
        }
    }

    async fn iframe_scan(&self) -> Result<Vec<StreamCandidate>, ResolverError> {
        let page = self.fetcher.get_text(&self.url).await?;
        let mut candidates = Vec::new();

        for iframe_src in utils::find_all_iframe_srcs(&page) {
            let iframe_url = utils::fix_url(BASE_URL, iframe_src);
            let body = match self
                .fetcher
                .get(&iframe_url)
                .header(reqwest::header::REFERER, &self.url)
                .send()
                .await
            {
                Ok(response) => match response.text().await {
                    Ok(body) => body,
                    Err(error) => {
                        debug!(%iframe_url, %error, "iframe body read failed; skipping");
                        continue;
                    }
                },
                Err(error) => {
                    debug!(%iframe_url, %error, "iframe fetch failed; skipping");
                    continue;
                }
            };

            if let Some(m3u8) = utils::find_m3u8_url(&body) {
                candidates.push(StreamCandidate::new(
                    m3u8,
                    self.candidate_headers(&iframe_url),
                ));
            }
        }

        Ok(candidates)
    }
}

#[async_trait::async_trait]
impl SourceExtractor for StreamBtw {
    fn name(&self) -> &'static str {
        "StreamBTW"
    }

    fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    fn variants(&self) -> &'static [&'static str] {
        &["page-scan", "iframe-scan"]
    }

    async fn run_variant(&self, index: usize) -> Result<Vec<StreamCandidate>, ResolverError> {
        match index {
            0 => self.page_scan().await,
            1 => self.iframe_scan().await,
            _ => Ok(vec![]),
        }
    }
}
