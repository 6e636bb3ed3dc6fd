//! Test doubles shared by the comic and dns unit tests.

use super::{ComicFetcher, FetchResponse};
use crate::error::ResolveError;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) use super::extract::fixtures::comic_page;

type Handler = Box<dyn Fn(&str, usize) -> Result<FetchResponse, ResolveError> + Send + Sync>;

/// Fetcher answering from a closure of (url, call index)
pub(crate) struct MockFetcher {
    call_count: AtomicUsize,
    delay: Duration,
    handler: Handler,
}

impl MockFetcher {
    pub(crate) fn new<H>(handler: H) -> Self
    where
        H: Fn(&str, usize) -> Result<FetchResponse, ResolveError> + Send + Sync + 'static,
    {
        Self {
            call_count: AtomicUsize::new(0),
            delay: Duration::ZERO,
            handler: Box::new(handler),
        }
    }

    /// Every URL serves the page of comic `id`
    pub(crate) fn serving(id: u64, title: &'static str, alt: &'static str) -> Self {
        Self::new(move |_, _| page(200, &comic_page(id, title, alt)))
    }

    /// Sleep before answering, so concurrent callers overlap
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl ComicFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, ResolveError> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(url, call)
    }
}

pub(crate) fn page(status: u16, body: &str) -> Result<FetchResponse, ResolveError> {
    Ok(FetchResponse {
        status,
        body: Bytes::from(body.to_string()),
    })
}
