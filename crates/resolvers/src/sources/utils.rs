use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::fetch::Fetcher;

pub static M3U8_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"'<>]+\.m3u8(?:\?[^\s"'<>]*)?"#).unwrap()
});

static IFRAME_SRC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<iframe[^>]+src\s*=\s*["']([^"']+)["']"#).unwrap());

static PACKED_ARGS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\}\s*\(\s*'(.*?)'\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*'([^']*)'\s*\.split\('\|'\)")
        .unwrap()
});

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

#[inline]
pub fn capture_group_1<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// First `.m3u8` URL appearing anywhere in `text`.
pub fn find_m3u8_url(text: &str) -> Option<&str> {
    M3U8_URL_REGEX.find(text).map(|m| m.as_str())
}

/// `src` of the first `<iframe>` in `html`.
pub fn find_iframe_src(html: &str) -> Option<&str> {
    capture_group_1(&IFRAME_SRC_REGEX, html)
}

/// `src` values of every `<iframe>` in `html`, in document order.
pub fn find_all_iframe_srcs(html: &str) -> Vec<&str> {
    IFRAME_SRC_REGEX
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Resolve scheme-relative and site-relative references against a base.
pub fn fix_url(base: &str, url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else if url.starts_with('/') {
        format!("{}{url}", base.trim_end_matches('/'))
    } else if !url.starts_with("http") {
        format!("{}/{url}", base.trim_end_matches('/'))
    } else {
        url.to_string()
    }
}

/// Last path segment of a URL, query string excluded.
pub fn last_path_segment(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Unpack a `eval(function(p,a,c,k,e,d)...)` packed script.
///
/// The packer replaces every identifier in the payload with its index
/// encoded in base `radix` (digits, then lowercase, then uppercase).
/// Returns `None` when `script` does not contain a packed block.
pub fn unpack_packed_js(script: &str) -> Option<String> {
    let caps = PACKED_ARGS_REGEX.captures(script)?;
    let payload = caps.get(1)?.as_str();
    let radix: usize = caps.get(2)?.as_str().parse().ok()?;
    let count: usize = caps.get(3)?.as_str().parse().ok()?;
    let words: Vec<&str> = caps.get(4)?.as_str().split('|').collect();

    if radix < 2 || radix > 62 || words.len() < count {
        return None;
    }

    let unpacked = WORD_REGEX.replace_all(payload, |token: &regex::Captures<'_>| {
        let token = token.get(0).unwrap().as_str();
        match decode_radix(token, radix) {
            Some(index) if index < count && !words[index].is_empty() => words[index].to_string(),
            _ => token.to_string(),
        }
    });

    Some(unpacked.into_owned())
}

fn decode_radix(token: &str, radix: usize) -> Option<usize> {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut value: usize = 0;
    for byte in token.bytes() {
        let digit = ALPHABET.iter().position(|&c| c == byte)?;
        if digit >= radix {
            return None;
        }
        value = value.checked_mul(radix)?.checked_add(digit)?;
    }
    Some(value)
}

/// Probe an ordered list of candidate URLs and return the first that serves
/// a genuine HLS manifest, together with its body.
///
/// Per-URL failures (network errors, non-2xx, non-manifest bodies) are
/// skipped, never surfaced: a miss on one template must not abort the probe.
pub async fn probe_first_manifest(
    fetcher: &Fetcher,
    urls: &[String],
) -> Option<(String, String)> {
    for url in urls {
        let response = match fetcher.get(url).send().await {
            Ok(response) => response,
            Err(error) => {
                debug!(%url, %error, "probe fetch failed; skipping");
                continue;
            }
        };
        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "probe rejected; skipping");
            continue;
        }
        match response.text().await {
            Ok(body) if body.trim_start().starts_with("#EXTM3U") => {
                return Some((url.clone(), body));
            }
            Ok(_) => debug!(%url, "probe body is not a manifest; skipping"),
            Err(error) => debug!(%url, %error, "probe body read failed; skipping"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn m3u8_url_scan() {
        let html = r#"<script>var player = {file: "https://cdn.example/live/index.m3u8?token=abc"};</script>"#;
        assert_eq!(
            find_m3u8_url(html),
            Some("https://cdn.example/live/index.m3u8?token=abc")
        );
    }

    #[test]
    fn iframe_scan_in_document_order() {
        let html = r#"<iframe id="rk" src="/live/r16w.php"></iframe><iframe src="//swipebreed.net/embed/x"></iframe>"#;
        assert_eq!(find_iframe_src(html), Some("/live/r16w.php"));
        assert_eq!(
            find_all_iframe_srcs(html),
            vec!["/live/r16w.php", "//swipebreed.net/embed/x"]
        );
    }

    #[test]
    fn url_fixups() {
        assert_eq!(
            fix_url("https://strimsy.top", "//swipebreed.net/embed/x"),
            "https://swipebreed.net/embed/x"
        );
        assert_eq!(
            fix_url("https://strimsy.top", "/live/r16w.php"),
            "https://strimsy.top/live/r16w.php"
        );
        assert_eq!(
            fix_url("https://strimsy.top", "https://other.example/a"),
            "https://other.example/a"
        );
    }

    #[test]
    fn last_segment_drops_query() {
        assert_eq!(
            last_path_segment("https://cdn.example/a/b/playlist.m3u8?x=1"),
            "playlist.m3u8"
        );
        assert_eq!(last_path_segment("https://ppv.wtf/live/123456"), "123456");
    }

    #[test]
    fn unpacks_packed_script() {
        let script = r#"eval(function(p,a,c,k,e,d){e=function(c){return c};if(!''.replace(/^/,String)){while(c--){d[e(c)]=k[c]||e(c)}k=[function(e){return d[e]}];e=function(){return'\\w+'};c=1};while(c--){if(k[c]){p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c])}}return p}('0 1="2://3.4/5.6"',10,7,'var|src|https|cdn|example|index|m3u8'.split('|'),0,{}))"#;
        let unpacked = unpack_packed_js(script).expect("should unpack");
        assert_eq!(unpacked, r#"var src="https://cdn.example/index.m3u8""#);
    }

    #[test]
    fn non_packed_script_is_none() {
        assert!(unpack_packed_js("var a = 1;").is_none());
    }

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Minimal HTTP target: 404s everything except `/live.m3u8` (a manifest)
    /// and `/page.html` (a non-manifest 200).
    async fn spawn_probe_target() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                    let response = if request.starts_with("GET /live.m3u8") {
                        "HTTP/1.1 200 OK\r\ncontent-length: 8\r\nconnection: close\r\n\r\n#EXTM3U\n"
                    } else if request.starts_with("GET /page.html") {
                        "HTTP/1.1 200 OK\r\ncontent-length: 15\r\nconnection: close\r\n\r\n<html>no</html>"
                    } else {
                        "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    };
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn probe_skips_failures_and_non_manifests() {
        let base = spawn_probe_target().await;
        let fetcher = Fetcher::new("Probe", reqwest::Client::new());
        let urls = vec![
            format!("{base}/missing.m3u8"),
            format!("{base}/page.html"),
            format!("{base}/live.m3u8"),
        ];

        let (url, body) = probe_first_manifest(&fetcher, &urls)
            .await
            .expect("the last url serves a manifest");
        assert_eq!(url, urls[2]);
        assert!(body.starts_with("#EXTM3U"));
    }

    #[tokio::test]
    async fn probe_returns_none_when_nothing_serves_a_manifest() {
        let base = spawn_probe_target().await;
        let fetcher = Fetcher::new("Probe", reqwest::Client::new());
        let urls = vec![format!("{base}/a.m3u8"), format!("{base}/page.html")];
        assert!(probe_first_manifest(&fetcher, &urls).await.is_none());
    }
}
