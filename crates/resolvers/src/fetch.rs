use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::ResolverError;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the shared HTTP client used by every extractor.
///
/// Redirects are followed and gzip/deflate bodies are transparently
/// decompressed by reqwest. The timeout is mandatory: a hung fetch must not
/// stall the whole resolution pipeline.
pub fn default_client() -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("Failed to create HTTP client")
}

/// Per-source HTTP fetch helper.
///
/// Each extractor instance owns a `Fetcher` carrying the source's default
/// headers and a cookie store, so site-specific session state never leaks
/// between sources. Requests built through [`get`]/[`post`] automatically
/// include both.
///
/// [`get`]: Fetcher::get
/// [`post`]: Fetcher::post
#[derive(Debug, Clone)]
pub struct Fetcher {
    pub source_name: String,
    pub client: Client,
    headers: HeaderMap,
    cookies: FxHashMap<String, String>,
}

impl Fetcher {
    pub fn new<S: Into<String>>(source_name: S, client: Client) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(DEFAULT_UA));
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-GB,en-US;q=0.9,en;q=0.8"),
        );
        // Do not set `Accept-Encoding`; reqwest adds it (and decompresses)
        // when the corresponding features are enabled.

        Self {
            source_name: source_name.into(),
            client,
            headers,
            cookies: FxHashMap::default(),
        }
    }

    pub fn add_header<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) {
        match HeaderName::from_str(key.as_ref()) {
            Ok(name) => match HeaderValue::from_str(value.as_ref()) {
                Ok(value) => {
                    self.headers.insert(name, value);
                }
                Err(e) => debug!(error = %e, "Invalid header value; skipping"),
            },
            Err(e) => debug!(error = %e, "Invalid header name; skipping"),
        }
    }

    pub fn set_referer(&mut self, referer: &str) {
        self.add_header(reqwest::header::REFERER.as_str(), referer);
    }

    pub fn set_origin(&mut self, origin: &str) {
        self.add_header(reqwest::header::ORIGIN.as_str(), origin);
    }

    pub fn add_cookie<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Import cookies from a `name1=value1; name2=value2` string.
    pub fn set_cookies_from_string(&mut self, cookie_string: &str) {
        for part in cookie_string.split(&[';', '\n'][..]).map(str::trim) {
            if part.is_empty() {
                continue;
            }
            let Some((name, value)) = part.split_once('=') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }
            self.cookies.insert(name.to_owned(), value.to_owned());
        }
    }

    pub fn get_cookie(&self, name: &str) -> Option<&String> {
        self.cookies.get(name)
    }

    fn build_cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut cookie_string = String::with_capacity(
            self.cookies.iter().map(|(k, v)| k.len() + 1 + v.len() + 2).sum(),
        );
        for (name, value) in &self.cookies {
            if !cookie_string.is_empty() {
                cookie_string.push_str("; ");
            }
            cookie_string.push_str(name);
            cookie_string.push('=');
            cookie_string.push_str(value);
        }
        Some(cookie_string)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut headers = self.headers.clone();

        if let Some(cookie_header) = self.build_cookie_header() {
            match HeaderValue::from_str(&cookie_header) {
                Ok(value) => {
                    headers.insert(reqwest::header::COOKIE, value);
                }
                Err(e) => debug!(error = %e, "Failed to build Cookie header"),
            }
        }

        self.client.request(method, url).headers(headers)
    }

    /// GET a page and return its body, treating any non-2xx status as an
    /// error so callers can tell "no such stream" apart from "network broken".
    pub async fn get_text(&self, url: &str) -> Result<String, ResolverError> {
        let response = self.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    pub fn headers_map(&self) -> FxHashMap<String, String> {
        let mut map = FxHashMap::with_capacity_and_hasher(self.headers.len(), Default::default());
        for (key, value) in &self.headers {
            if let Ok(value) = value.to_str() {
                map.insert(key.as_str().to_owned(), value.to_owned());
            }
        }
        if let Some(cookie_header) = self.build_cookie_header() {
            map.insert(reqwest::header::COOKIE.as_str().to_owned(), cookie_header);
        }
        map
    }
}

/// Collect `Set-Cookie` pairs from a response into a `k=v; k=v` string.
pub fn cookies_from_response(response: &Response) -> String {
    let mut cookie_string = String::new();
    for value in response.headers().get_all(reqwest::header::SET_COOKIE).iter() {
        if let Ok(cookie_str) = value.to_str()
            && let Some(cookie_part) = cookie_str.split(';').next()
            && cookie_part.contains('=')
        {
            if !cookie_string.is_empty() {
                cookie_string.push_str("; ");
            }
            cookie_string.push_str(cookie_part.trim());
        }
    }
    cookie_string
}
