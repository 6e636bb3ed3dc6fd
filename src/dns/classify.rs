//! Query name classification.
//!
//! Accepted shapes, relative to the zone:
//!
//! ```text
//! zone.                     random comic, all fields
//! <selector>.zone.          random comic, one field
//! <id>.zone.                comic <id>, all fields
//! <selector>.<id>.zone.     comic <id>, one field
//! ```
//!
//! where `<selector>` is one of `title`, `img`, `alt`.

use crate::comic::{FieldSelector, RequestTarget};
use crate::error::ResolveError;

/// Classify a query name against `zone` (lowercase, with trailing dot).
///
/// Matching is case-insensitive and tolerates a missing trailing dot on
/// `name`. Any other shape is rejected.
pub fn classify(name: &str, zone: &str) -> Result<(RequestTarget, FieldSelector), ResolveError> {
    let mut name = name.to_ascii_lowercase();
    if !name.ends_with('.') {
        name.push('.');
    }

    let prefix = if name == zone {
        ""
    } else {
        // Must end in ".<zone>" so "notxkcd." never matches "xkcd."
        name.strip_suffix(zone)
            .and_then(|rest| rest.strip_suffix('.'))
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| invalid(&name, "outside zone"))?
    };

    let labels: Vec<&str> = if prefix.is_empty() {
        Vec::new()
    } else {
        prefix.split('.').collect()
    };

    match labels.as_slice() {
        [] => Ok((RequestTarget::Random, FieldSelector::All)),
        [label] => {
            if let Some(selector) = FieldSelector::from_label(label) {
                Ok((RequestTarget::Random, selector))
            } else {
                let id = parse_id(label).ok_or_else(|| invalid(&name, "unknown label"))?;
                Ok((RequestTarget::ById(id), FieldSelector::All))
            }
        }
        [selector, id] => {
            let selector =
                FieldSelector::from_label(selector).ok_or_else(|| invalid(&name, "unknown selector"))?;
            let id = parse_id(id).ok_or_else(|| invalid(&name, "comic id is not a number"))?;
            Ok((RequestTarget::ById(id), selector))
        }
        _ => Err(invalid(&name, "too many labels")),
    }
}

/// Digits only; rejects signs, whitespace and empty labels
fn parse_id(label: &str) -> Option<u64> {
    if label.is_empty() || !label.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    label.parse().ok()
}

fn invalid(name: &str, reason: &str) -> ResolveError {
    ResolveError::InvalidRequest(format!("{}: {}", name, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONE: &str = "xkcd.";

    fn ok(name: &str) -> (RequestTarget, FieldSelector) {
        classify(name, ZONE).unwrap()
    }

    fn rejected(name: &str) -> bool {
        matches!(classify(name, ZONE), Err(ResolveError::InvalidRequest(_)))
    }

    #[test]
    fn test_zone_apex_is_random_all() {
        assert_eq!(ok("xkcd."), (RequestTarget::Random, FieldSelector::All));
    }

    #[test]
    fn test_selector_only_is_random() {
        assert_eq!(ok("title.xkcd."), (RequestTarget::Random, FieldSelector::Title));
        assert_eq!(ok("img.xkcd."), (RequestTarget::Random, FieldSelector::Image));
        assert_eq!(ok("alt.xkcd."), (RequestTarget::Random, FieldSelector::AltText));
    }

    #[test]
    fn test_id_only_is_all_fields() {
        assert_eq!(ok("42.xkcd."), (RequestTarget::ById(42), FieldSelector::All));
        assert_eq!(ok("0.xkcd."), (RequestTarget::ById(0), FieldSelector::All));
    }

    #[test]
    fn test_selector_and_id() {
        assert_eq!(ok("img.42.xkcd."), (RequestTarget::ById(42), FieldSelector::Image));
        assert_eq!(ok("title.1.xkcd."), (RequestTarget::ById(1), FieldSelector::Title));
        assert_eq!(ok("alt.2000.xkcd."), (RequestTarget::ById(2000), FieldSelector::AltText));
    }

    #[test]
    fn test_non_numeric_id_rejected() {
        assert!(rejected("abc.xkcd."));
        assert!(rejected("title.abc.xkcd."));
        assert!(rejected("-1.xkcd."));
        assert!(rejected("+1.xkcd."));
        assert!(rejected("title.1e3.xkcd."));
    }

    #[test]
    fn test_wrong_shape_rejected() {
        assert!(rejected("1.2.xkcd."));
        assert!(rejected("42.title.xkcd."));
        assert!(rejected("title.img.xkcd."));
        assert!(rejected("alt.title.42.xkcd."));
        assert!(rejected("image.42.xkcd."));
    }

    #[test]
    fn test_empty_label_rejected() {
        assert!(rejected(".xkcd."));
        assert!(rejected("title..xkcd."));
    }

    #[test]
    fn test_outside_zone_rejected() {
        assert!(rejected("example.com."));
        assert!(rejected("notxkcd."));
        assert!(rejected("42.xkcd.com."));
        assert!(rejected("."));
    }

    #[test]
    fn test_id_overflow_rejected() {
        assert!(rejected("99999999999999999999999.xkcd."));
    }

    #[test]
    fn test_case_insensitive_and_relative_names() {
        assert_eq!(ok("TITLE.42.XKCD."), (RequestTarget::ById(42), FieldSelector::Title));
        assert_eq!(ok("img.42.xkcd"), (RequestTarget::ById(42), FieldSelector::Image));
        assert_eq!(ok("xkcd"), (RequestTarget::Random, FieldSelector::All));
    }

    #[test]
    fn test_custom_zone() {
        let zone = "comics.example.org.";
        assert_eq!(
            classify("alt.7.comics.example.org.", zone).unwrap(),
            (RequestTarget::ById(7), FieldSelector::AltText)
        );
        assert!(classify("7.example.org.", zone).is_err());
    }

    #[test]
    fn test_error_names_query() {
        match classify("bogus.xkcd.", ZONE) {
            Err(ResolveError::InvalidRequest(msg)) => assert!(msg.contains("bogus.xkcd.")),
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }
}
