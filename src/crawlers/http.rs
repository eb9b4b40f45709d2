use crate::crawlers::{FetchedResource, Fetcher};
use crate::error::FetchError;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

/// Plain HTTP fetcher. Sees the real status code and content type, but not
/// content that only appears after scripts run.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        ::log::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let final_url = response.url().to_string();

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        ::log::debug!("{} answered {} ({} bytes)", final_url, status, body.len());

        Ok(FetchedResource {
            // Records are keyed by the requested link; the body resolves against the final URL
            final_url: (final_url != url).then_some(final_url),
            url: url.to_string(),
            status,
            content_type,
            body,
        })
    }
}
