use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;

use crate::error::ResolverError;
use crate::extractor::SourceExtractor;

pub mod ppvland;
pub mod streambtw;
pub mod streamed;
pub mod strimsy;
pub(crate) mod utils;

use ppvland::PpvLand;
use streambtw::StreamBtw;
use streamed::Streamed;
use strimsy::Strimsy;

// A type alias for a thread-safe constructor function.
type ExtractorConstructor =
    fn(String, Option<String>, Option<String>, Client) -> Box<dyn SourceExtractor>;

struct SourceEntry {
    regex: &'static LazyLock<Regex>,
    constructor: ExtractorConstructor,
}

macro_rules! source_registry {
    ( $( $regex:path => $builder:path ),+ $(,)? ) => {
        &[
            $(
                SourceEntry {
                    regex: &$regex,
                    constructor: |url, referer, cookies, client| {
                        Box::new($builder(url, referer, cookies, client))
                            as Box<dyn SourceExtractor>
                    },
                },
            )+
        ]
    };
}

// Static source registry, matched in declaration order.
static SOURCES: &[SourceEntry] = source_registry![
    ppvland::URL_REGEX => PpvLand::new,
    strimsy::URL_REGEX => Strimsy::new,
    streambtw::URL_REGEX => StreamBtw::new,
    streamed::URL_REGEX => Streamed::new,
];

/// Create the extractor whose URL pattern matches `url`.
pub fn create_extractor(
    url: &str,
    referer: Option<&str>,
    cookies: Option<&str>,
    client: Client,
) -> Result<Box<dyn SourceExtractor>, ResolverError> {
    for source in SOURCES {
        if source.regex.is_match(url) {
            return Ok((source.constructor)(
                url.to_string(),
                referer.map(ToOwned::to_owned),
                cookies.map(ToOwned::to_owned),
                client,
            ));
        }
    }
    Err(ResolverError::UnsupportedSource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_matches_known_sources() {
        let client = Client::new();
        for url in [
            "https://ppv.wtf/live/123456",
            "https://strimsy.top/Dart.php",
            "https://streambtw.com/live/nfl1.php",
            "https://streamed.su/api/stream/alpha/abc123/1",
        ] {
            assert!(create_extractor(url, None, None, client.clone()).is_ok(), "{url}");
        }
    }

    #[test]
    fn unknown_source_is_rejected() {
        let result = create_extractor("https://example.com/watch", None, None, Client::new());
        assert!(matches!(result, Err(ResolverError::UnsupportedSource)));
    }
}
