use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// Static assets that never contain auditable images
const ASSET_PATTERN: &str = r"(?i)\.(jpg|jpeg|png|gif|webp|avif|css|js|ico|woff|woff2|ttf|eot|svg|pdf|zip|mp4|mp3)$";

/// Configuration for choosing which discovered links get audited
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkFilterConfig {
    /// Only links on this host are audited (if None, every host is accepted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_host: Option<String>,

    /// Regex patterns for links to include (if empty, all links are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for links to exclude (these take precedence over include patterns)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for LinkFilterConfig {
    fn default() -> Self {
        Self {
            required_host: None,
            include_patterns: Vec::new(),
            exclude_patterns: vec![ASSET_PATTERN.to_string()],
        }
    }
}

/// Decides which links found on a sitemap page are worth auditing
#[derive(Debug)]
pub struct LinkFilter {
    config: LinkFilterConfig,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self::new(LinkFilterConfig::default()).expect("Default regex patterns should be valid")
    }
}

impl LinkFilter {
    /// Create a new link filter from configuration
    pub fn new(config: LinkFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            include_regexes,
            exclude_regexes,
        })
    }

    /// Filter scoped to the host of the sitemap page, with extra user patterns
    pub fn for_site(
        root_url: &Url,
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, regex::Error> {
        let mut config = LinkFilterConfig {
            required_host: root_url.host_str().map(str::to_string),
            include_patterns: include_patterns.to_vec(),
            ..LinkFilterConfig::default()
        };
        config.exclude_patterns.extend(exclude_patterns.iter().cloned());
        Self::new(config)
    }

    /// Determine if a link should be audited based on all filtering rules
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if let Some(required_host) = &self.config.required_host {
            if url.host_str() != Some(required_host.as_str()) {
                return false;
            }
        }

        // Exclusions are matched against the path so query strings don't hide assets
        let path = url.path();
        let url_str = url.as_str();
        if self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(path) || regex.is_match(url_str))
        {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|regex| regex.is_match(url_str))
    }

    /// Create a normalized version of the URL (fragments removed)
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }

    /// Filters, normalizes and deduplicates candidate links, keeping the first
    /// occurrence order, and stops after `limit` links.
    pub fn select(&self, candidates: &[String], limit: Option<usize>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            if limit.is_some_and(|limit| selected.len() >= limit) {
                ::log::info!(
                    "Link limit reached, ignoring {} remaining candidates",
                    candidates.len() - index
                );
                break;
            }

            let Ok(url) = Url::parse(candidate) else {
                ::log::debug!("Skipping unparsable link: {}", candidate);
                continue;
            };

            if !self.should_crawl(&url) {
                ::log::debug!("Link filter rejected: {}", url);
                continue;
            }

            let normalized = self.normalize_url(&url).to_string();
            if seen.insert(normalized.clone()) {
                selected.push(normalized);
            }
        }

        selected
    }
}
