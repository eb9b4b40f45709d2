//! `image-url` deep links: a page URL carrying the source of one image, so
//! the reviewer can jump to that image on the live page.

use crate::error::{AuditError, Result};
use crate::parsers::html::document_base;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

pub const IMAGE_URL_PARAM: &str = "image-url";

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("static selector"));

/// Link to `page_link` that points at the image `src`
pub fn image_deep_link(page_link: &str, src: &str) -> String {
    match Url::parse(page_link) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(IMAGE_URL_PARAM, src);
            url.to_string()
        }
        Err(e) => {
            ::log::debug!("Cannot build deep link from {:?}: {}", page_link, e);
            page_link.to_string()
        }
    }
}

/// Image URL carried by a deep link, if any
pub fn image_url_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == IMAGE_URL_PARAM)
        .map(|(_, value)| value.into_owned())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedImage {
    /// Position among the page's `<img>` elements
    pub index: usize,
    pub src: String,
    pub alt: Option<String>,
}

/// Finds the `<img>` of `html` that `image_url` refers to.
///
/// An exact match on the raw or resolved `src` wins; otherwise the first
/// image whose raw `src` starts with the image URL's path and query.
pub fn locate_image(html: &str, page_url: &Url, image_url: &str) -> Option<LocatedImage> {
    let doc = Html::parse_document(html);
    let base = document_base(&doc, page_url.as_str()).unwrap_or_else(|| page_url.clone());
    let images: Vec<(usize, &str, Option<&str>)> = doc
        .select(&IMG_SELECTOR)
        .enumerate()
        .filter_map(|(index, img)| {
            let element = img.value();
            element
                .attr("src")
                .map(|src| (index, src, element.attr("alt")))
        })
        .collect();

    let exact = images.iter().find(|(_, src, _)| {
        *src == image_url
            || base
                .join(src)
                .map(|resolved| resolved.as_str() == image_url)
                .unwrap_or(false)
    });

    let found = exact.or_else(|| {
        let target = Url::parse(image_url).ok()?;
        let mut prefix = target.path().to_string();
        if let Some(query) = target.query() {
            prefix.push('?');
            prefix.push_str(query);
        }
        images.iter().find(|(_, src, _)| src.starts_with(&prefix))
    })?;

    let (index, src, alt) = *found;
    Some(LocatedImage {
        index,
        src: src.to_string(),
        alt: alt.map(str::to_string),
    })
}

/// Resolves a deep link against the page HTML
pub fn locate_deep_link(html: &str, deep_link: &str) -> Result<Option<LocatedImage>> {
    let url = Url::parse(deep_link)?;
    let image_url = image_url_param(&url).ok_or_else(|| {
        AuditError::Config(format!("{deep_link} carries no {IMAGE_URL_PARAM} parameter"))
    })?;
    Ok(locate_image(html, &url, &image_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <img src="/static/logo.png" alt="Logo">
        <img src="https://cdn.e.com/hero.jpg">
        <img src="/media/photo.jpg?w=300&amp;h=200" alt="">
        <img alt="no source">
    </body></html>"#;

    fn page_url() -> Url {
        Url::parse("https://e.com/blog/post").unwrap()
    }

    #[test]
    fn test_deep_link_round_trip() {
        let link = image_deep_link("https://e.com/blog/post", "https://e.com/a b.png");
        assert!(link.starts_with("https://e.com/blog/post?image-url="));

        let url = Url::parse(&link).unwrap();
        assert_eq!(image_url_param(&url).as_deref(), Some("https://e.com/a b.png"));
    }

    #[test]
    fn test_deep_link_keeps_existing_query() {
        let link = image_deep_link("https://e.com/?lang=en", "https://e.com/x.png");
        let url = Url::parse(&link).unwrap();
        assert_eq!(url.query_pairs().count(), 2);
        assert_eq!(image_url_param(&url).as_deref(), Some("https://e.com/x.png"));
    }

    #[test]
    fn test_exact_match_on_resolved_src() {
        let found = locate_image(PAGE, &page_url(), "https://e.com/static/logo.png").unwrap();
        assert_eq!(found.index, 0);
        assert_eq!(found.alt.as_deref(), Some("Logo"));

        let found = locate_image(PAGE, &page_url(), "https://cdn.e.com/hero.jpg").unwrap();
        assert_eq!(found.index, 1);
        assert_eq!(found.alt, None);
    }

    #[test]
    fn test_prefix_match_on_path_and_query() {
        let found = locate_image(PAGE, &page_url(), "https://other.e.com/media/photo.jpg?w=300").unwrap();
        assert_eq!(found.index, 2);
        assert_eq!(found.src, "/media/photo.jpg?w=300&h=200");
    }

    #[test]
    fn test_exact_match_honours_base_element() {
        let html = r#"<base href="https://cdn.e.com/assets/"><img src="a.png"><img src="pic.png">"#;
        let found = locate_image(html, &page_url(), "https://cdn.e.com/assets/pic.png").unwrap();
        assert_eq!(found.index, 1);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(locate_image(PAGE, &page_url(), "https://e.com/missing.png"), None);
    }

    #[test]
    fn test_locate_deep_link_requires_param() {
        assert!(locate_deep_link(PAGE, "https://e.com/blog/post").is_err());

        let link = image_deep_link("https://e.com/blog/post", "https://e.com/static/logo.png");
        let found = locate_deep_link(PAGE, &link).unwrap().unwrap();
        assert_eq!(found.index, 0);
    }
}
