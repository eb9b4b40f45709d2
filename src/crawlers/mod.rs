pub mod batch;
pub mod http;
pub mod lazy;
pub mod webdriver;

use crate::error::FetchError;
use std::future::Future;

/// A fetched response, reduced to what the auditor classifies on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    /// URL that was requested
    pub url: String,
    /// Where the response actually came from, when a redirect was followed
    pub final_url: Option<String>,
    /// HTTP status code
    pub status: u16,
    /// Value of the `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Response body as text
    pub body: String,
}

impl FetchedResource {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// URL relative references in the body resolve against
    pub fn document_url(&self) -> &str {
        self.final_url.as_deref().unwrap_or(&self.url)
    }
}

/// Backend that retrieves pages for the auditor.
///
/// Implementations must be shareable across tasks: the lazy pre-fetcher runs
/// on its own task.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedResource, FetchError>> + Send;
}
