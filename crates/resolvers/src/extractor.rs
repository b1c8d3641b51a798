use async_trait::async_trait;

use crate::error::ResolverError;
use crate::fetch::Fetcher;
use crate::media::StreamCandidate;

/// One site-specific extraction strategy.
///
/// An extractor declares a fixed, ordered list of variants (direct API
/// lookup, embed scraping, CDN pattern probing, ...). The coordinator runs
/// them in declared order and stops at the first variant whose candidates
/// survive validation.
///
/// A variant that ran cleanly but found nothing returns `Ok(vec![])`; an
/// `Err` is reserved for genuine faults (network, parse). Either way the
/// coordinator moves on to the next variant, only the logging differs.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetcher(&self) -> &Fetcher;

    /// Variant names in execution order.
    fn variants(&self) -> &'static [&'static str];

    /// Run the variant at `index` (an index into [`variants`]).
    ///
    /// [`variants`]: SourceExtractor::variants
    async fn run_variant(&self, index: usize) -> Result<Vec<StreamCandidate>, ResolverError>;
}
