use crate::Action;
use scraper::{Html, Selector};

/// Markers a host page carries for the auditor: the crawl mode, a serialized
/// dataset from an earlier run and the last viewed page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostDocument {
    /// Full HTML of the host page
    pub html: String,
    /// `script[data-action]`
    pub action: Option<Action>,
    /// Raw `script[data-table]` value, parsed by the cache reader
    pub cached_table: Option<String>,
    /// `script[data-page]`
    pub cached_page: Option<usize>,
}

impl HostDocument {
    pub fn parse(html: &str) -> Self {
        let doc = Html::parse_document(html);

        let action = marker(&doc, "data-action").and_then(|value| {
            let action = value.parse::<Action>().ok();
            if action.is_none() {
                ::log::warn!("Ignoring unknown data-action {:?}", value);
            }
            action
        });

        let cached_page = marker(&doc, "data-page").and_then(|value| value.trim().parse().ok());

        Self {
            html: html.to_string(),
            action,
            cached_table: marker(&doc, "data-table"),
            cached_page,
        }
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let html = std::fs::read_to_string(path)?;
        Ok(Self::parse(&html))
    }
}

fn marker(doc: &Html, attribute: &str) -> Option<String> {
    let selector = Selector::parse(&format!("script[{attribute}]")).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|script| script.value().attr(attribute))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_are_read() {
        let html = r#"<html><head>
            <script data-action="usePage"></script>
            <script data-table='[[{"pageLink":"https://e.com/","error":"x"}]]'></script>
            <script data-page=" 2 "></script>
        </head><body></body></html>"#;

        let host = HostDocument::parse(html);
        assert_eq!(host.action, Some(Action::UsePage));
        assert_eq!(
            host.cached_table.as_deref(),
            Some(r#"[[{"pageLink":"https://e.com/","error":"x"}]]"#)
        );
        assert_eq!(host.cached_page, Some(2));
    }

    #[test]
    fn test_missing_or_unknown_markers() {
        let host = HostDocument::parse(r#"<script data-action="crawlEverything"></script><img src="a.png">"#);
        assert_eq!(host.action, None);
        assert_eq!(host.cached_table, None);
        assert_eq!(host.cached_page, None);
    }
}
