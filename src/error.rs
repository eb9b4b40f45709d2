use std::path::PathBuf;
use thiserror::Error;

/// Failure to retrieve a resource. Converted into an error record by the crawl
/// batch, so it never escapes a crawl.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("webdriver error: {0}")]
    WebDriver(String),

    #[error("no WebDriver server reachable at {0} or any fallback address")]
    WebDriverUnavailable(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cached audit data in {source_name} is corrupt: {reason}")]
    Corrupt {
        source_name: &'static str,
        reason: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("store file {path} is not a JSON object: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to render the audit table: {0}")]
    Render(#[from] askama::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("page {page} is out of range (1..={total})")]
    PageOutOfRange { page: usize, total: usize },

    #[error("no image at row {page_index}, image {image_index} of the current page")]
    RowOutOfRange {
        page_index: usize,
        image_index: usize,
    },

    #[error("no audit data stored for {0}")]
    NothingStored(String),
}

pub type Result<T> = std::result::Result<T, AuditError>;
