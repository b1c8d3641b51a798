use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality tier of a stream, ordered from lowest to highest.
///
/// `Unknown` sorts below every concrete tier so that "best link" selection
/// prefers anything with an inferred quality over an unranked candidate.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub enum Quality {
    #[default]
    Unknown,
    P240,
    P360,
    P480,
    P720,
    P1080,
    P1440,
    P2160,
}

impl Quality {
    /// Map a manifest `BANDWIDTH` value (bits per second) to a quality tier.
    pub fn from_bandwidth(bandwidth: u64) -> Self {
        match bandwidth {
            b if b >= 8_000_000 => Quality::P1080,
            b if b >= 5_000_000 => Quality::P720,
            b if b >= 2_500_000 => Quality::P480,
            b if b >= 1_000_000 => Quality::P360,
            _ => Quality::P240,
        }
    }

    /// Infer a quality tier from substrings of a URL when no manifest has
    /// been fetched. Checks higher tiers first so `2160` is not misread
    /// as `160`.
    pub fn from_url_hint(url: &str) -> Self {
        let url = url.to_ascii_lowercase();
        const HINTS: &[(&str, Quality)] = &[
            ("4k", Quality::P2160),
            ("2160", Quality::P2160),
            ("1440", Quality::P1440),
            ("1080", Quality::P1080),
            ("720", Quality::P720),
            ("480", Quality::P480),
            ("360", Quality::P360),
            ("240", Quality::P240),
        ];
        for (hint, quality) in HINTS {
            if url.contains(hint) {
                return *quality;
            }
        }
        Quality::Unknown
    }

    /// Infer a quality tier from a fetched manifest body.
    ///
    /// For a master playlist the maximum `BANDWIDTH` across all
    /// `#EXT-X-STREAM-INF` entries is mapped through [`from_bandwidth`];
    /// media playlists carry no bandwidth information and yield `None`.
    ///
    /// [`from_bandwidth`]: Quality::from_bandwidth
    pub fn from_manifest(body: &[u8]) -> Option<Self> {
        let playlist = m3u8_rs::parse_master_playlist_res(body).ok()?;
        playlist
            .variants
            .iter()
            .map(|variant| variant.bandwidth)
            .max()
            .map(Quality::from_bandwidth)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Unknown => "unknown",
            Quality::P240 => "240p",
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::P1440 => "1440p",
            Quality::P2160 => "2160p",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(9_000_000, Quality::P1080)]
    #[case(8_000_000, Quality::P1080)]
    #[case(5_500_000, Quality::P720)]
    #[case(3_000_000, Quality::P480)]
    #[case(1_200_000, Quality::P360)]
    #[case(400_000, Quality::P240)]
    fn bandwidth_maps_to_tier(#[case] bandwidth: u64, #[case] expected: Quality) {
        assert_eq!(Quality::from_bandwidth(bandwidth), expected);
    }

    #[test]
    fn url_hint_prefers_higher_tier() {
        assert_eq!(
            Quality::from_url_hint("https://cdn.example/4k/stream.m3u8"),
            Quality::P2160
        );
        assert_eq!(
            Quality::from_url_hint("https://cdn.example/hd1080/index.m3u8"),
            Quality::P1080
        );
        assert_eq!(
            Quality::from_url_hint("https://cdn.example/live/index.m3u8"),
            Quality::Unknown
        );
    }

    #[test]
    fn manifest_uses_max_bandwidth() {
        let manifest = b"#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=3000000,RESOLUTION=842x480\n\
mid.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=9000000,RESOLUTION=1920x1080\n\
high.m3u8\n";
        assert_eq!(Quality::from_manifest(manifest), Some(Quality::P1080));
    }

    #[test]
    fn media_playlist_has_no_tier() {
        let manifest = b"#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg1.ts\n";
        assert_eq!(Quality::from_manifest(manifest), None);
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(Quality::P1080 > Quality::P720);
        assert!(Quality::P240 > Quality::Unknown);
    }
}
