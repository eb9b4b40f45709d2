use crate::crawlers::Fetcher;
use crate::filter::LinkFilter;
use crate::parsers::{ExtractOptions, Parser};
use crate::results::PageRecord;
use futures::future::join_all;
use std::time::Duration;

pub const NOT_FOUND_ERROR: &str = "Page not found (404)";

/// Throttling and extraction settings shared by every fetch of a batch
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Pause before each request
    pub delay: Duration,
    pub extract: ExtractOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(450),
            extract: ExtractOptions::default(),
        }
    }
}

/// Fetches one link and turns the outcome into a record. Never fails: every
/// problem becomes an error record for that link.
pub async fn fetch_page<F: Fetcher>(fetcher: &F, link: &str, options: &BatchOptions) -> PageRecord {
    if !options.delay.is_zero() {
        tokio::time::sleep(options.delay).await;
    }

    let resource = match fetcher.fetch(link).await {
        Ok(resource) => resource,
        Err(e) => {
            ::log::warn!("Failed to fetch {}: {}", link, e);
            return PageRecord::failed(link, format!("Failed to fetch the page: {e}"));
        }
    };

    if resource.status == 404 {
        ::log::info!("{} was not found", link);
        return PageRecord::failed(link, NOT_FOUND_ERROR);
    }

    if !resource.is_success() {
        ::log::info!("{} answered with status {}", link, resource.status);
        return PageRecord::failed(
            link,
            format!("Failed to load the page (HTTP {})", resource.status),
        );
    }

    let record = Parser::parse_resource(&resource, &options.extract);
    match &record {
        PageRecord::Audited(page) => {
            ::log::info!("Found {} images in {}", page.images.len(), link)
        }
        PageRecord::Failed(page) => ::log::info!("{}: {}", link, page.error),
    }
    record
}

/// Fetches all links concurrently. The result has exactly one record per
/// link, in input order.
pub async fn crawl_links<F: Fetcher>(
    fetcher: &F,
    links: &[String],
    options: &BatchOptions,
) -> Vec<PageRecord> {
    let start_time = std::time::Instant::now();
    ::log::info!("Fetching {} pages", links.len());

    let records = join_all(links.iter().map(|link| fetch_page(fetcher, link, options))).await;

    let failed = records.iter().filter(|record| record.is_error()).count();
    ::log::info!(
        "Fetched {} pages ({} with errors) in {:.2} seconds",
        records.len(),
        failed,
        start_time.elapsed().as_secs_f64()
    );

    records
}

/// Reads the sitemap page and returns the links worth auditing, already
/// filtered, deduplicated and capped.
pub async fn collect_links<F: Fetcher>(
    fetcher: &F,
    sitemap_url: &str,
    filter: &LinkFilter,
    limit: Option<usize>,
) -> Result<Vec<String>, crate::error::FetchError> {
    let resource = fetcher.fetch(sitemap_url).await?;
    if !resource.is_success() {
        return Err(crate::error::FetchError::Request(format!(
            "{} answered with status {}",
            sitemap_url, resource.status
        )));
    }

    let candidates = Parser::parse_links(&resource);
    let links = filter.select(&candidates, limit);
    ::log::info!(
        "Sitemap {} yielded {} links ({} candidates)",
        sitemap_url,
        links.len(),
        candidates.len()
    );
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawlers::testing::{MockFetcher, page_with_images};
    use url::Url;

    fn quick() -> BatchOptions {
        BatchOptions {
            delay: Duration::ZERO,
            ..BatchOptions::default()
        }
    }

    #[tokio::test]
    async fn test_batch_tolerates_failures() {
        let fetcher = MockFetcher::new()
            .with_html("https://e.com/1", &page_with_images("One", &["/1.png"]))
            .with_html("https://e.com/2", &page_with_images("Two", &["/2.png"]))
            .with_page("https://e.com/3", 404, "text/html", "")
            .with_html("https://e.com/4", &page_with_images("Four", &["/4.png"]))
            .with_page("https://e.com/5", 500, "text/html", "");

        let links: Vec<String> = (1..=5).map(|n| format!("https://e.com/{n}")).collect();
        let records = crawl_links(&fetcher, &links, &quick()).await;

        assert_eq!(records.len(), 5);
        assert_eq!(records.iter().filter(|r| r.is_error()).count(), 2);
        for (record, link) in records.iter().zip(&links) {
            assert_eq!(record.page_link(), link);
        }
        assert_eq!(records[2].error(), Some(NOT_FOUND_ERROR));
        assert_eq!(records[4].error(), Some("Failed to load the page (HTTP 500)"));
    }

    #[tokio::test]
    async fn test_transport_and_content_errors() {
        let fetcher = MockFetcher::new()
            .with_page("https://e.com/feed", 200, "application/rss+xml", "<rss/>")
            .with_html("https://e.com/empty", "<title>Empty</title><p>nothing</p>");

        let options = quick();
        let unreachable = fetch_page(&fetcher, "https://e.com/down", &options).await;
        assert!(unreachable.error().unwrap().starts_with("Failed to fetch the page"));

        let feed = fetch_page(&fetcher, "https://e.com/feed", &options).await;
        assert!(feed.error().unwrap().contains("application/rss+xml"));

        let empty = fetch_page(&fetcher, "https://e.com/empty", &options).await;
        assert_eq!(empty.error(), Some(crate::parsers::html::NO_IMAGES_ERROR));
    }

    #[tokio::test]
    async fn test_redirect_keeps_requested_link() {
        let fetcher = MockFetcher::new().with_redirect(
            "https://e.com/old",
            "https://e.com/blog/new",
            &page_with_images("Moved", &["cover.png"]),
        );

        let record = fetch_page(&fetcher, "https://e.com/old", &quick()).await;
        assert_eq!(record.page_link(), "https://e.com/old");
        assert_eq!(record.images()[0].src, "https://e.com/blog/cover.png");
    }

    #[tokio::test]
    async fn test_collect_links_from_sitemap_page() {
        let sitemap = r#"<a href="/a">A</a><a href="/b#x">B</a><a href="/a">A again</a>
            <a href="https://e.com/c">C</a><a href="https://elsewhere.org/d">D</a>
            <a href="/logo.png">logo</a>"#;
        let fetcher = MockFetcher::new().with_html("https://e.com/sitemap", sitemap);
        let filter = LinkFilter::for_site(&Url::parse("https://e.com/sitemap").unwrap(), &[], &[]).unwrap();

        let links = collect_links(&fetcher, "https://e.com/sitemap", &filter, None)
            .await
            .unwrap();
        assert_eq!(links, vec!["https://e.com/a", "https://e.com/b", "https://e.com/c"]);

        let capped = collect_links(&fetcher, "https://e.com/sitemap", &filter, Some(1))
            .await
            .unwrap();
        assert_eq!(capped, vec!["https://e.com/a"]);
    }

    #[tokio::test]
    async fn test_collect_links_fails_on_missing_sitemap() {
        let fetcher = MockFetcher::new().with_page("https://e.com/sitemap", 404, "text/html", "");
        let filter = LinkFilter::default();
        assert!(
            collect_links(&fetcher, "https://e.com/sitemap", &filter, None)
                .await
                .is_err()
        );
    }
}
