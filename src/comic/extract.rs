//! Field extraction from a comic page.

use crate::error::ResolveError;
use scraper::{ElementRef, Html, Selector};

/// Raw fields pulled out of a comic page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicPage {
    pub title: String,
    pub image_url: String,
    pub alt_text: String,
    /// The page's own canonical URL (`og:url`)
    pub self_url: String,
}

fn selector(css: &str) -> Result<Selector, ResolveError> {
    Selector::parse(css)
        .map_err(|e| ResolveError::ExtractionFailed(format!("bad selector {}: {}", css, e)))
}

fn first<'a>(document: &'a Html, css: &str) -> Result<Option<ElementRef<'a>>, ResolveError> {
    Ok(document.select(&selector(css)?).next())
}

/// Extract title, image, alt text and self URL from a comic page.
///
/// A page without a title or without a self URL is rejected. A missing
/// image (interactive comics) leaves image and alt text empty.
pub fn extract_comic_page(body: &[u8]) -> Result<ComicPage, ResolveError> {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let title = first(&document, "#ctitle")?
        .map(|e| e.text().collect::<String>().trim().to_string())
        .ok_or_else(|| ResolveError::ExtractionFailed("missing comic title".to_string()))?;

    let image = first(&document, "#comic img")?;
    let image_url = image
        .and_then(|e| e.value().attr("src"))
        .map(absolute_image_url)
        .unwrap_or_default();
    let alt_text = image
        .and_then(|e| e.value().attr("title"))
        .unwrap_or_default()
        .to_string();

    let self_url = first(&document, r#"meta[property="og:url"]"#)?
        .and_then(|e| e.value().attr("content"))
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ResolveError::ExtractionFailed("missing og:url".to_string()))?;

    Ok(ComicPage {
        title,
        image_url,
        alt_text,
        self_url,
    })
}

/// Protocol-relative image sources (`//imgs.xkcd.com/...`) become https URLs
fn absolute_image_url(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{}", src)
    } else {
        src.to_string()
    }
}

/// Derive the comic number from a self URL shaped like `https://host/<id>/`.
///
/// Split on `/` this yields exactly five components with the id at index 3.
pub fn canonical_id(self_url: &str) -> Result<u64, ResolveError> {
    let parts: Vec<&str> = self_url.split('/').collect();
    if parts.len() != 5 {
        return Err(ResolveError::ExtractionFailed(format!(
            "unexpected self URL shape: {}",
            self_url
        )));
    }

    match parts[3].parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ResolveError::ExtractionFailed(format!(
            "no comic number in self URL: {}",
            self_url
        ))),
    }
}
