//! Answer building and error-to-rcode mapping.

use super::wire::{ResponseCode, TxtRecord};
use crate::comic::{Comic, FieldSelector};
use crate::error::ResolveError;

/// Build the TXT answers for `comic`, each owned by `name`.
///
/// `All` yields title, image URL, alt text, in that order.
pub fn build_answers(name: &str, comic: &Comic, selector: FieldSelector) -> Vec<TxtRecord> {
    let fields: Vec<&str> = match selector {
        FieldSelector::Title => vec![comic.title.as_str()],
        FieldSelector::Image => vec![comic.image_url.as_str()],
        FieldSelector::AltText => vec![comic.alt_text.as_str()],
        FieldSelector::All => vec![
            comic.title.as_str(),
            comic.image_url.as_str(),
            comic.alt_text.as_str(),
        ],
    };

    fields
        .into_iter()
        .map(|text| TxtRecord {
            name: name.to_string(),
            text: text.to_string(),
        })
        .collect()
}

/// Response code sent for a failed resolution
pub fn response_code_for(err: &ResolveError) -> ResponseCode {
    match err {
        ResolveError::InvalidRequest(_) | ResolveError::UpstreamUnavailable(_) => {
            ResponseCode::NxDomain
        }
        ResolveError::FetchFailed(_) | ResolveError::ExtractionFailed(_) => ResponseCode::ServFail,
    }
}
