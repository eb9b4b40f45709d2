use crate::Action;
use crate::crawlers::batch::BatchOptions;
use crate::error::{AuditError, Result};
use crate::parsers::ExtractOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backend used to retrieve pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    /// Plain HTTP requests
    #[default]
    Http,
    /// A browser driven over WebDriver
    WebDriver,
}

/// Configuration for an audit run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Sitemap page (or single page) to audit
    pub start_url: String,

    /// Crawl the links of the start page, or only the start page itself
    #[serde(default)]
    pub action: Action,

    /// Maximum number of links audited from a sitemap (0 for no limit)
    #[serde(default = "default_link_limit")]
    pub link_limit: usize,

    /// Pause before each page request, in milliseconds
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,

    /// How pages are retrieved
    #[serde(default)]
    pub fetcher: FetcherKind,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// User agent for plain HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// JSON file holding persisted audits
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Ignore images inside `<header>`
    #[serde(default)]
    pub skip_header_images: bool,

    /// Regex patterns for links to include
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for links to exclude
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Fetch one pagination page at a time instead of the whole sitemap
    #[serde(default)]
    pub lazy: bool,

    /// Quiet period before each background pre-fetch, in milliseconds
    #[serde(default = "default_prefetch_quiet_ms")]
    pub prefetch_quiet_ms: u64,
}

fn default_link_limit() -> usize {
    120
}

fn default_fetch_delay_ms() -> u64 {
    450
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

pub fn default_user_agent() -> String {
    concat!("img-audit/", env!("CARGO_PKG_VERSION")).to_string()
}

pub fn default_store_path() -> PathBuf {
    PathBuf::from("img-audit-store.json")
}

fn default_prefetch_quiet_ms() -> u64 {
    1000
}

impl AuditConfig {
    /// Create a new configuration with default values
    pub fn new(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            action: Action::default(),
            link_limit: default_link_limit(),
            fetch_delay_ms: default_fetch_delay_ms(),
            fetcher: FetcherKind::default(),
            webdriver_url: default_webdriver_url(),
            user_agent: default_user_agent(),
            store_path: default_store_path(),
            skip_header_images: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            lazy: false,
            prefetch_quiet_ms: default_prefetch_quiet_ms(),
        }
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents).map_err(|e| {
            AuditError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override the WebDriver URL with the `WEBDRIVER_URL` environment variable if provided
    pub fn apply_env(&mut self) {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
    }

    pub fn link_limit(&self) -> Option<usize> {
        (self.link_limit > 0).then_some(self.link_limit)
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            skip_header_images: self.skip_header_images,
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            delay: Duration::from_millis(self.fetch_delay_ms),
            extract: self.extract_options(),
        }
    }

    pub fn prefetch_quiet(&self) -> Duration {
        Duration::from_millis(self.prefetch_quiet_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config = AuditConfig::from_json(r#"{"start_url": "https://e.com/sitemap"}"#).unwrap();
        assert_eq!(config.action, Action::UseSitemap);
        assert_eq!(config.link_limit(), Some(120));
        assert_eq!(config.batch_options().delay, Duration::from_millis(450));
        assert_eq!(config.fetcher, FetcherKind::Http);
        assert!(!config.lazy);
    }

    #[test]
    fn test_overrides_from_json() {
        let config = AuditConfig::from_json(
            r#"{
                "start_url": "https://e.com/",
                "action": "usePage",
                "link_limit": 0,
                "fetcher": "webdriver",
                "skip_header_images": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.action, Action::UsePage);
        assert_eq!(config.link_limit(), None);
        assert_eq!(config.fetcher, FetcherKind::WebDriver);
        assert!(config.extract_options().skip_header_images);
    }

    #[test]
    fn test_from_file_reports_bad_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            AuditConfig::from_file(&path),
            Err(AuditError::Config(_))
        ));
    }
}
