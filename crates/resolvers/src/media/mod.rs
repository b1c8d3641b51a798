pub mod candidate;
pub mod link;
pub mod quality;

pub use candidate::StreamCandidate;
pub use link::{LinkKind, ResolvedLink};
pub use quality::Quality;
