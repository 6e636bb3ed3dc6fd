//! Comic records, the expiring comic cache, and the fetch/extract pipeline.

mod cache;
mod extract;
mod fetch;
mod resolver;
#[cfg(test)]
pub(crate) mod testing;

pub use cache::{spawn_sweeper, ComicCache, SweepStats, SweeperHandle};
pub use extract::{canonical_id, extract_comic_page, ComicPage};
pub use fetch::{ComicFetcher, FetchResponse, HttpsFetcher};
pub use resolver::ComicResolver;

use std::fmt;

/// A comic resolved from its page. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comic {
    /// Canonical number taken from the page itself
    pub id: u64,
    pub title: String,
    pub image_url: String,
    pub alt_text: String,
}

/// Which comic a query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTarget {
    Random,
    ById(u64),
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestTarget::Random => write!(f, "random"),
            RequestTarget::ById(id) => write!(f, "{}", id),
        }
    }
}

/// Which fields of a comic a query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSelector {
    Title,
    Image,
    AltText,
    All,
}

impl FieldSelector {
    /// Map a query label to a selector. Only the exact keywords are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "title" => Some(FieldSelector::Title),
            "img" => Some(FieldSelector::Image),
            "alt" => Some(FieldSelector::AltText),
            _ => None,
        }
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSelector::Title => write!(f, "title"),
            FieldSelector::Image => write!(f, "img"),
            FieldSelector::AltText => write!(f, "alt"),
            FieldSelector::All => write!(f, "all"),
        }
    }
}
