pub mod html;
pub mod sitemap;


use crate::crawlers::FetchedResource;
use crate::results::PageRecord;

/// Kinds of fetched content the auditor distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// HTML document, audited for images
    Html,
    /// XML sitemap, mined for `<loc>` entries
    Xml,
    /// Anything else (plain text, media, scripts, ...)
    Other,
}

impl ContentKind {
    /// Classifies a `Content-Type` header value, falling back to the URL when
    /// the header is missing.
    pub fn classify(content_type: Option<&str>, url: &str) -> Self {
        match content_type {
            Some(value) => Self::from_content_type(value),
            None => Self::from_url(url),
        }
    }

    pub fn from_content_type(value: &str) -> Self {
        let mime = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "text/html" || mime == "application/xhtml+xml" {
            ContentKind::Html
        } else if mime == "application/xml" || mime == "text/xml" {
            ContentKind::Xml
        } else {
            ContentKind::Other
        }
    }

    /// Guesses from the URL path when no header is available
    pub fn from_url(url: &str) -> Self {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if path.ends_with(".xml") {
            ::log::debug!("Classifying as Xml: {}", url);
            ContentKind::Xml
        } else if path.ends_with(".txt")
            || path.ends_with(".pdf")
            || path.ends_with(".jpg")
            || path.ends_with(".jpeg")
            || path.ends_with(".png")
            || path.ends_with(".gif")
            || path.ends_with(".svg")
            || path.ends_with(".css")
            || path.ends_with(".js")
            || path.ends_with(".json")
        {
            ::log::debug!("Classifying as Other: {}", url);
            ContentKind::Other
        } else {
            ::log::debug!("Classifying as Html: {}", url);
            ContentKind::Html
        }
    }
}

/// Options controlling image extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Ignore images nested inside `<header>` (logos, navigation icons)
    pub skip_header_images: bool,
}

/// Turns fetched resources into page records
pub struct Parser;

impl Parser {
    /// Audits a successfully fetched resource. Non-HTML resources become an
    /// error record rather than being dropped.
    pub fn parse_resource(resource: &FetchedResource, options: &ExtractOptions) -> PageRecord {
        let kind = ContentKind::classify(resource.content_type.as_deref(), &resource.url);
        if kind != ContentKind::Html {
            let described = resource
                .content_type
                .clone()
                .unwrap_or_else(|| "unknown content type".to_string());
            ::log::info!("Skipping non-HTML resource {} ({})", resource.url, described);
            return PageRecord::failed(
                resource.url.clone(),
                format!("{} ({})", html::NOT_HTML_ERROR, described),
            );
        }

        html::extract_page_at(&resource.body, &resource.url, resource.document_url(), options)
    }

    /// Collects crawl candidates from a sitemap resource, which is either an
    /// XML sitemap or an ordinary HTML page full of links.
    pub fn parse_links(resource: &FetchedResource) -> Vec<String> {
        let kind = ContentKind::classify(resource.content_type.as_deref(), &resource.url);
        if kind == ContentKind::Xml || sitemap::looks_like_sitemap(&resource.body) {
            sitemap::parse_locations(&resource.body)
        } else {
            html::extract_links(&resource.body, resource.document_url())
        }
    }
}
