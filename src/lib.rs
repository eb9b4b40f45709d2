// Re-export modules
pub mod cache;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod events;
pub mod filter;
pub mod host;
pub mod locate;
pub mod pagination;
pub mod parsers;
pub mod render;
pub mod results;
pub mod session;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use error::{AuditError, Result};
pub use results::{Dataset, ImageDescriptor, PageRecord};
pub use session::{ActionKind, TableAction, TableSession};

use crate::cache::CachedAudit;
use crate::crawlers::batch::{self, BatchOptions};
use crate::crawlers::lazy::LazyDataset;
use crate::crawlers::{FetchedResource, Fetcher};
use crate::events::EventSink;
use crate::filter::LinkFilter;
use crate::host::HostDocument;
use crate::parsers::{Parser, html};
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

/// Crawl mode of an audit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Audit every link found on the start page
    #[default]
    #[serde(rename = "useSitemap")]
    UseSitemap,
    /// Audit the start page only
    #[serde(rename = "usePage")]
    UsePage,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::UseSitemap => f.write_str("useSitemap"),
            Action::UsePage => f.write_str("usePage"),
        }
    }
}

impl FromStr for Action {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "useSitemap" => Ok(Action::UseSitemap),
            "usePage" => Ok(Action::UsePage),
            other => Err(AuditError::Config(format!("unknown action {other:?}"))),
        }
    }
}

/// Main builder for an image audit of a site
pub struct Audit {
    config: config::AuditConfig,
}

impl Audit {
    /// Create a new audit of the given start URL with default settings
    pub fn new(start_url: &str) -> Self {
        Self {
            config: config::AuditConfig::new(start_url),
        }
    }

    /// Use a full configuration
    pub fn with_config(mut self, config: config::AuditConfig) -> Self {
        self.config = config;
        self
    }

    /// Load settings from a file, keeping the start URL of this builder
    pub fn with_config_file(self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let mut config = config::AuditConfig::from_file(path)?;
        config.start_url = self.config.start_url;
        Ok(Self { config })
    }

    /// Set the crawl mode
    pub fn with_action(mut self, action: Action) -> Self {
        self.config.action = action;
        self
    }

    /// Set the maximum number of sitemap links (0 for no limit)
    pub fn with_link_limit(mut self, limit: usize) -> Self {
        self.config.link_limit = limit;
        self
    }

    /// Set the pause before each request
    pub fn with_fetch_delay(mut self, delay_ms: u64) -> Self {
        self.config.fetch_delay_ms = delay_ms;
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.config.lazy = lazy;
        self
    }

    pub fn config(&self) -> &config::AuditConfig {
        &self.config
    }

    pub fn start_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.config.start_url)?)
    }

    /// Store key of the audited page
    pub fn namespace(&self) -> Result<String> {
        Ok(store::storage_namespace(&self.start_url()?))
    }

    /// Crawl mode, with the host document's marker taking precedence
    pub fn action(&self, host: Option<&HostDocument>) -> Action {
        host.and_then(|host| host.action).unwrap_or(self.config.action)
    }

    /// Previously saved audit data. A corrupt cache is reported and ignored.
    pub fn cached<S: KeyValueStore + ?Sized>(
        &self,
        host: Option<&HostDocument>,
        store: &S,
    ) -> Result<Option<CachedAudit>> {
        let namespace = self.namespace()?;
        match cache::read_cached(host, store, &namespace) {
            Ok(cached) => Ok(cached),
            Err(e) => {
                ::log::warn!("{}; starting a fresh crawl", e);
                Ok(None)
            }
        }
    }

    /// Runs the audit: restores cached data when present, crawls otherwise,
    /// and returns the review session for it. Fresh data is announced to the
    /// sink right away.
    pub async fn run<F, S, E>(
        &self,
        fetcher: Arc<F>,
        host: Option<&HostDocument>,
        store: &S,
        sink: E,
    ) -> Result<TableSession<E>>
    where
        F: Fetcher + 'static,
        S: KeyValueStore + ?Sized,
        E: EventSink,
    {
        let action = self.action(host);
        let host_page = host.and_then(|host| host.cached_page);

        if let Some(cached) = self.cached(host, store)? {
            let page = host_page.or(cached.page).unwrap_or(1);
            return Ok(TableSession::new(cached.dataset, action, page, sink));
        }

        let dataset = self.crawl(fetcher.as_ref(), host, action).await?;
        let session = TableSession::new(dataset, action, host_page.unwrap_or(1), sink);
        session.notify_data_change();
        Ok(session)
    }

    /// Builds a fresh dataset without looking at any cache
    pub async fn crawl<F: Fetcher>(
        &self,
        fetcher: &F,
        host: Option<&HostDocument>,
        action: Action,
    ) -> Result<Dataset> {
        let start_time = std::time::Instant::now();
        ::log::info!("Starting {} audit of {}", action, self.config.start_url);

        let records = match action {
            Action::UsePage => vec![self.audit_start_page(fetcher, host).await],
            Action::UseSitemap => {
                let links = self.collect_links(fetcher, host).await?;
                batch::crawl_links(fetcher, &links, &self.config.batch_options()).await
            }
        };

        ::log::info!(
            "Audit of {} finished with {} pages in {:.2} seconds",
            self.config.start_url,
            records.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(Dataset::from_records(records))
    }

    /// Links to audit, taken from the host document when one is given and
    /// from the fetched start page otherwise
    pub async fn collect_links<F: Fetcher>(
        &self,
        fetcher: &F,
        host: Option<&HostDocument>,
    ) -> Result<Vec<String>> {
        let start_url = self.start_url()?;
        let filter = LinkFilter::for_site(
            &start_url,
            &self.config.include_patterns,
            &self.config.exclude_patterns,
        )
        .map_err(|e| AuditError::Config(format!("invalid link pattern: {e}")))?;

        match host {
            Some(host) => {
                let resource = FetchedResource {
                    url: self.config.start_url.clone(),
                    final_url: None,
                    status: 200,
                    content_type: Some("text/html".to_string()),
                    body: host.html.clone(),
                };
                Ok(filter.select(&Parser::parse_links(&resource), self.config.link_limit()))
            }
            None => Ok(batch::collect_links(
                fetcher,
                &self.config.start_url,
                &filter,
                self.config.link_limit(),
            )
            .await?),
        }
    }

    async fn audit_start_page<F: Fetcher>(&self, fetcher: &F, host: Option<&HostDocument>) -> PageRecord {
        match host {
            Some(host) => html::extract_page(
                &host.html,
                &self.config.start_url,
                &self.config.extract_options(),
            ),
            None => {
                let options = BatchOptions {
                    delay: std::time::Duration::ZERO,
                    extract: self.config.extract_options(),
                };
                batch::fetch_page(fetcher, &self.config.start_url, &options).await
            }
        }
    }

    /// Prepares a chunk-at-a-time crawl of the sitemap links
    pub async fn start_lazy<F: Fetcher + 'static>(
        &self,
        fetcher: Arc<F>,
        host: Option<&HostDocument>,
    ) -> Result<LazyDataset<F>> {
        let links = self.collect_links(fetcher.as_ref(), host).await?;
        Ok(LazyDataset::new(fetcher, links, self.config.batch_options()))
    }
}
