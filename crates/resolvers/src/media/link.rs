use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{Quality, StreamCandidate};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// A direct media file (mp4 and friends).
    Direct,
    /// An HLS playlist.
    Hls,
}

/// Final output of resolution, owned by the caller. The caller either hands
/// the URL straight to a player or registers it with the proxy.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResolvedLink {
    pub url: String,
    pub referer: Option<String>,
    pub headers: FxHashMap<String, String>,
    pub quality: Quality,
    pub kind: LinkKind,
}

impl ResolvedLink {
    pub fn from_candidate(candidate: StreamCandidate) -> Self {
        Self {
            kind: if candidate.is_playlist {
                LinkKind::Hls
            } else {
                LinkKind::Direct
            },
            referer: candidate.referer().map(ToOwned::to_owned),
            url: candidate.url,
            headers: candidate.headers,
            quality: candidate.quality,
        }
    }
}
