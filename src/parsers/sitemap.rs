use regex::Regex;
use std::sync::LazyLock;

static LOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").expect("static regex"));

static SITEMAP_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(urlset|sitemapindex)[\s>]").expect("static regex"));

/// True when the body is an XML sitemap or sitemap index
pub fn looks_like_sitemap(body: &str) -> bool {
    SITEMAP_ROOT.is_match(body)
}

/// Extracts every `<loc>` entry of an XML sitemap, in document order
pub fn parse_locations(xml: &str) -> Vec<String> {
    LOC.captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str()))
        .filter(|loc| !loc.is_empty())
        .collect()
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
