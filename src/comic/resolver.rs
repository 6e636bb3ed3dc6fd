//! Resolution pipeline: cache lookup, fetch, extract, populate.

use super::extract::{canonical_id, extract_comic_page};
use super::{Comic, ComicCache, ComicFetcher, RequestTarget};
use crate::config::UpstreamConfig;
use crate::error::ResolveError;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a request target into a comic, consulting and populating the cache.
///
/// No lock is held while fetching. Two resolutions racing on an uncached id
/// may both fetch; whichever inserts first is kept and the other returns the
/// cached comic, discarding its own fetch.
pub struct ComicResolver<F: ComicFetcher> {
    fetcher: F,
    cache: Arc<ComicCache>,
    upstream: UpstreamConfig,
    enable_logging: bool,
}

impl<F: ComicFetcher> ComicResolver<F> {
    pub fn new(
        fetcher: F,
        cache: Arc<ComicCache>,
        upstream: UpstreamConfig,
        enable_logging: bool,
    ) -> Self {
        ComicResolver {
            fetcher,
            cache,
            upstream,
            enable_logging,
        }
    }

    pub fn cache(&self) -> &Arc<ComicCache> {
        &self.cache
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub async fn resolve(&self, target: RequestTarget) -> Result<Comic, ResolveError> {
        // A random comic's id is unknown until its page is fetched
        let url = match target {
            RequestTarget::ById(id) => {
                if let Some(comic) = self.cache.get(id).await {
                    if self.enable_logging {
                        debug!(id = id, "Comic cache hit");
                    }
                    return Ok(comic);
                }
                self.upstream.comic_url(id)
            }
            RequestTarget::Random => self.upstream.random_url.clone(),
        };

        if self.enable_logging {
            debug!(target = %target, url = %url, "Comic cache miss, fetching");
        }

        let fetched = self.fetch_comic(&url).await?;
        let (comic, inserted) = self.cache.get_or_insert(fetched.id, fetched).await;

        if self.enable_logging {
            if inserted {
                info!(id = comic.id, title = %comic.title, "Comic cached");
            } else {
                debug!(id = comic.id, "Comic already cached, discarding fetched copy");
            }
        }

        Ok(comic)
    }

    async fn fetch_comic(&self, url: &str) -> Result<Comic, ResolveError> {
        let response = self.fetcher.fetch(url).await?;
        if !response.is_success() {
            return Err(ResolveError::UpstreamUnavailable(response.status));
        }

        let page = extract_comic_page(&response.body)?;
        let id = canonical_id(&page.self_url)?;

        Ok(Comic {
            id,
            title: page.title,
            image_url: page.image_url,
            alt_text: page.alt_text,
        })
    }
}
