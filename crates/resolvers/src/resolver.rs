use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::ResolverError;
use crate::extractor::SourceExtractor;
use crate::fetch::default_client;
use crate::media::ResolvedLink;
use crate::sources;
use crate::validator::LinkValidator;

/// Coordinates the resolution pipeline: pick the source extractor matching
/// the page URL, run its variants in declared order, validate each variant's
/// candidates, and return the first variant's accepted links.
///
/// Independent resolutions can run concurrently; the resolver holds no
/// mutable state beyond the shared HTTP client.
pub struct StreamResolver {
    client: Client,
    validator: LinkValidator,
}

impl StreamResolver {
    pub fn new() -> Self {
        Self::with_client(default_client())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            validator: LinkValidator::new(client.clone()),
            client,
        }
    }

    /// Resolve every playable link for `url`. Links are returned in the
    /// order the winning variant produced them.
    pub async fn resolve(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<Vec<ResolvedLink>, ResolverError> {
        self.resolve_with_cookies(url, referer, None).await
    }

    pub async fn resolve_with_cookies(
        &self,
        url: &str,
        referer: Option<&str>,
        cookies: Option<&str>,
    ) -> Result<Vec<ResolvedLink>, ResolverError> {
        let extractor = sources::create_extractor(url, referer, cookies, self.client.clone())?;
        self.run_extractor(extractor.as_ref()).await
    }

    async fn run_extractor(
        &self,
        extractor: &dyn SourceExtractor,
    ) -> Result<Vec<ResolvedLink>, ResolverError> {
        let source = extractor.name();

        for (index, variant) in extractor.variants().iter().enumerate() {
            match extractor.run_variant(index).await {
                Ok(candidates) if candidates.is_empty() => {
                    debug!(source, variant, "variant produced no candidates");
                }
                Ok(candidates) => {
                    let mut links = Vec::with_capacity(candidates.len());
                    for candidate in candidates {
                        match self.validator.validate(candidate).await {
                            Ok(link) => links.push(link),
                            Err(rejection) => {
                                debug!(source, variant, %rejection, "candidate rejected");
                            }
                        }
                    }
                    if !links.is_empty() {
                        info!(source, variant, count = links.len(), "stream resolved");
                        return Ok(links);
                    }
                }
                // A variant fault aborts only that variant; the next one
                // may still succeed.
                Err(error) => warn!(source, variant, %error, "variant failed; trying next"),
            }
        }

        Err(ResolverError::NoStreamFound)
    }

    /// Resolve and keep only the highest-quality link.
    pub async fn resolve_best(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<ResolvedLink, ResolverError> {
        self.resolve_best_with_cookies(url, referer, None).await
    }

    pub async fn resolve_best_with_cookies(
        &self,
        url: &str,
        referer: Option<&str>,
        cookies: Option<&str>,
    ) -> Result<ResolvedLink, ResolverError> {
        let links = self.resolve_with_cookies(url, referer, cookies).await?;
        pick_best(links).ok_or(ResolverError::NoStreamFound)
    }
}

fn pick_best(links: Vec<ResolvedLink>) -> Option<ResolvedLink> {
    links.into_iter().max_by_key(|link| link.quality)
}

impl Default for StreamResolver {
    fn default() -> Self {
        Self::new()
    }
}
