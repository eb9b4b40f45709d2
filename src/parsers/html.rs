use crate::parsers::ExtractOptions;
use crate::results::{ImageDescriptor, PageRecord};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

pub const NO_IMAGES_ERROR: &str = "No images were found on this page";
pub const NOT_HTML_ERROR: &str = "Not an HTML document";

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Builds the audit record for an HTML document.
///
/// Never fails: a document without any `<img>` yields an error record.
pub fn extract_page(html: &str, page_url: &str, options: &ExtractOptions) -> PageRecord {
    extract_page_at(html, page_url, page_url, options)
}

/// Like [`extract_page`] for a document served from `document_url`, e.g.
/// after a redirect. The record keeps `page_link`.
pub fn extract_page_at(
    html: &str,
    page_link: &str,
    document_url: &str,
    options: &ExtractOptions,
) -> PageRecord {
    let doc = Html::parse_document(html);
    extract_from_document(&doc, page_link, document_url, options)
}

/// Same as [`extract_page_at`] for an already parsed document.
pub fn extract_from_document(
    doc: &Html,
    page_link: &str,
    document_url: &str,
    options: &ExtractOptions,
) -> PageRecord {
    let base = document_base(doc, document_url);

    let skipped: HashSet<_> = if options.skip_header_images {
        doc.select(&selector("header img")).map(|e| e.id()).collect()
    } else {
        HashSet::new()
    };

    let images = doc
        .select(&selector("img"))
        .filter(|e| !skipped.contains(&e.id()))
        .map(|e| describe_image(e, base.as_ref()))
        .collect::<Vec<_>>();

    ::log::debug!("HTML extractor found {} images in {}", images.len(), page_link);

    if images.is_empty() {
        return PageRecord::failed(page_link, NO_IMAGES_ERROR);
    }

    PageRecord::audited(page_title(doc), page_link.to_string(), images)
}

/// Base URL for relative references: the first `<base href>` resolved
/// against the document URL, or the document URL itself
pub fn document_base(doc: &Html, document_url: &str) -> Option<Url> {
    let url = Url::parse(document_url).ok()?;
    let base = doc
        .select(&selector("base[href]"))
        .next()
        .and_then(|e| e.value().attr("href"))
        .and_then(|href| url.join(href.trim()).ok());
    Some(base.unwrap_or(url))
}

fn describe_image(element: ElementRef<'_>, base: Option<&Url>) -> ImageDescriptor {
    let src = element
        .value()
        .attr("src")
        .map(|raw| resolve(base, raw).unwrap_or_else(|| raw.to_string()))
        .unwrap_or_default();
    let alt = element.value().attr("alt").map(str::to_string);

    ImageDescriptor::new(src, alt)
}

fn resolve(base: Option<&Url>, raw: &str) -> Option<String> {
    match base {
        Some(base) => base.join(raw).ok().map(String::from),
        None => Url::parse(raw).ok().map(String::from),
    }
}

/// Text of the first `<title>`, without newlines or tabs
pub fn page_title(doc: &Html) -> String {
    doc.select(&selector("title"))
        .next()
        .map(|title| title.text().collect::<String>().replace(['\n', '\t'], ""))
        .unwrap_or_default()
}

/// Collects root-relative and absolute links of a page, resolved against the
/// document base. Scope filtering happens later in the link filter.
pub fn extract_links(html: &str, page_url: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let base = document_base(&doc, page_url);

    let links = doc
        .select(&selector("a[href]"))
        .filter_map(|e| e.value().attr("href"))
        .map(str::trim)
        .filter(|href| href.starts_with('/') || href.starts_with("http://") || href.starts_with("https://"))
        .filter_map(|href| resolve(base.as_ref(), href))
        .collect::<Vec<String>>();

    ::log::debug!("HTML parser found {} candidate links", links.len());
    if !links.is_empty() {
        ::log::debug!(
            "First few links: {:?}",
            links.iter().take(5).collect::<Vec<_>>()
        );
    }

    links
}
