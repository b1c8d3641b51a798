//! Playlist rewriting.
//!
//! HLS playlists are order-sensitive: segment sequencing is positional, so
//! the rewritten output preserves input line order exactly. Comment lines
//! and blank lines pass through untouched; every URI reference line is
//! resolved against the upstream's own URL and replaced with a proxy-local
//! `{file_name}?q={ticket}` path carrying the same header set.

use rustc_hash::FxHashMap;
use url::Url;

use crate::error::ProxyError;
use crate::ticket::ProxyTicket;

const HLS_MARKER: &str = "#EXTM3U";

/// Rewrite a playlist fetched from `upstream` so every URI reference points
/// back at the proxy.
///
/// The first non-empty line must be the manifest marker; anything else is a
/// fatal parse error and no partial output is produced.
pub fn rewrite_playlist(
    manifest: &str,
    upstream: &Url,
    headers: &FxHashMap<String, String>,
) -> Result<String, ProxyError> {
    let first = manifest.lines().map(str::trim).find(|line| !line.is_empty());
    match first {
        Some(line) if line.starts_with(HLS_MARKER) => {}
        Some(line) => {
            return Err(ProxyError::InvalidPlaylist(format!(
                "expected {HLS_MARKER}, got {line:?}"
            )));
        }
        None => return Err(ProxyError::InvalidPlaylist("empty body".to_string())),
    }

    let mut output = String::with_capacity(manifest.len() * 2);
    for line in manifest.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            output.push_str(line);
        } else {
            let absolute = upstream
                .join(trimmed)
                .map_err(|e| ProxyError::InvalidPlaylist(format!("bad URI reference: {e}")))?;
            let ticket = ProxyTicket::new(absolute.to_string(), headers.clone());
            output.push_str(&ticket.proxied_path()?);
        }
        output.push('\n');
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream() -> Url {
        Url::parse("https://cdn.example/live/index.m3u8").unwrap()
    }

    #[test]
    fn relative_segment_gets_absolute_ticket() {
        let manifest = "#EXTM3U\n#EXTINF:4.0,\nseg1.ts\n";
        let rewritten = rewrite_playlist(manifest, &upstream(), &FxHashMap::default()).unwrap();

        let segment_line = rewritten.lines().nth(2).unwrap();
        let (file, token) = segment_line.split_once("?q=").unwrap();
        assert_eq!(file, "seg1.ts");

        let ticket = ProxyTicket::decode(token).unwrap();
        assert_eq!(ticket.u, "https://cdn.example/live/seg1.ts");
    }

    #[test]
    fn absolute_urls_are_reticketed_not_joined() {
        let manifest = "#EXTM3U\nhttps://other.example/a/b.ts\n";
        let rewritten = rewrite_playlist(manifest, &upstream(), &FxHashMap::default()).unwrap();

        let token = rewritten
            .lines()
            .nth(1)
            .unwrap()
            .split_once("?q=")
            .unwrap()
            .1;
        assert_eq!(
            ProxyTicket::decode(token).unwrap().u,
            "https://other.example/a/b.ts"
        );
    }

    #[test]
    fn headers_are_carried_into_segment_tickets() {
        let mut headers = FxHashMap::default();
        headers.insert("Referer".to_string(), "https://embed.example/".to_string());

        let manifest = "#EXTM3U\nseg1.ts\n";
        let rewritten = rewrite_playlist(manifest, &upstream(), &headers).unwrap();
        let token = rewritten
            .lines()
            .nth(1)
            .unwrap()
            .split_once("?q=")
            .unwrap()
            .1;
        assert_eq!(ProxyTicket::decode(token).unwrap().h, headers);
    }

    #[test]
    fn comments_blanks_and_order_are_preserved() {
        let manifest = "#EXTM3U\n#EXT-X-VERSION:3\n\n#EXTINF:4.0,\nseg1.ts\n#EXTINF:4.0,\nseg2.ts\n#EXT-X-ENDLIST\n";
        let rewritten = rewrite_playlist(manifest, &upstream(), &FxHashMap::default()).unwrap();

        let lines: Vec<&str> = rewritten.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXT-X-VERSION:3");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "#EXTINF:4.0,");
        assert!(lines[4].starts_with("seg1.ts?q="));
        assert_eq!(lines[5], "#EXTINF:4.0,");
        assert!(lines[6].starts_with("seg2.ts?q="));
        assert_eq!(lines[7], "#EXT-X-ENDLIST");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn leading_blank_lines_before_marker_are_tolerated() {
        let manifest = "\n\n#EXTM3U\nseg1.ts\n";
        assert!(rewrite_playlist(manifest, &upstream(), &FxHashMap::default()).is_ok());
    }

    #[test]
    fn non_manifest_body_is_rejected() {
        let err = rewrite_playlist("<html>403</html>", &upstream(), &FxHashMap::default())
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidPlaylist(_)));
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(matches!(
            rewrite_playlist("", &upstream(), &FxHashMap::default()),
            Err(ProxyError::InvalidPlaylist(_))
        ));
    }
}
