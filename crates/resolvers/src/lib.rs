//! Stream resolution pipeline for sports streaming sites.
//!
//! The crate turns a public event-page URL into one or more validated,
//! playable media links. Each supported site has a [`SourceExtractor`]
//! implementation exposing an ordered list of extraction variants; the
//! [`StreamResolver`] coordinator runs the variants in declared order and
//! returns the first variant's validated links.

pub mod error;
pub mod extractor;
pub mod fetch;
pub mod media;
pub mod resolver;
pub mod sources;
pub mod validator;

pub use error::ResolverError;
pub use extractor::SourceExtractor;
pub use fetch::{Fetcher, default_client};
pub use media::{LinkKind, Quality, ResolvedLink, StreamCandidate};
pub use resolver::StreamResolver;
pub use validator::{LinkValidator, Rejection};
