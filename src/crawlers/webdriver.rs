use crate::crawlers::{FetchedResource, Fetcher};
use crate::error::FetchError;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder};
use tokio::sync::Mutex;

/// Addresses tried when the configured WebDriver URL does not answer
const FALLBACK_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// Fetches pages through a real browser so script-inserted images are seen.
///
/// One browser session is shared by every fetch: a page is navigated to and
/// read while holding the session lock. WebDriver does not expose the HTTP
/// status, so a successful navigation is reported as a 200 HTML response.
pub struct WebDriverFetcher {
    webdriver_url: String,
    client: Mutex<Option<Client>>,
}

impl WebDriverFetcher {
    /// Create a fetcher. The WebDriver session is opened on first use.
    pub fn new(webdriver_url: &str) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            client: Mutex::new(None),
        }
    }

    /// Ends the browser session, if one was opened
    pub async fn close(&self) {
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
        }
    }

    /// Page source and the URL the browser ended up on
    async fn navigate(client: &Client, url: &str) -> Result<(String, String), CmdError> {
        client.goto(url).await?;
        let source = client.source().await?;
        let current = client.current_url().await?;
        Ok((source, current.to_string()))
    }
}

impl Fetcher for WebDriverFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let mut session = self.client.lock().await;

        let client = match session.as_ref() {
            Some(client) => client.clone(),
            None => {
                ::log::debug!("Connecting to WebDriver for {}", url);
                let client = connect_to_webdriver(&self.webdriver_url).await?;
                *session = Some(client.clone());
                client
            }
        };

        let (source, current_url) = match Self::navigate(&client, url).await {
            Ok(page) => page,
            Err(e) if is_lost_session(&e) => {
                ::log::warn!("Lost WebDriver session while accessing {}, reconnecting", url);
                let client = connect_to_webdriver(&self.webdriver_url).await?;
                *session = Some(client.clone());
                Self::navigate(&client, url)
                    .await
                    .map_err(|e| FetchError::WebDriver(e.to_string()))?
            }
            Err(e) => {
                ::log::error!("Failed to access {}: {}", url, e);
                return Err(FetchError::WebDriver(e.to_string()));
            }
        };

        Ok(FetchedResource {
            final_url: (current_url != url).then_some(current_url),
            url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: source,
        })
    }
}

fn is_lost_session(error: &CmdError) -> bool {
    error.to_string().contains("Unable to find session")
}

/// Connects to the WebDriver instance, trying common alternative addresses
async fn connect_to_webdriver(webdriver_url: &str) -> Result<Client, FetchError> {
    match ClientBuilder::native().connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
        }
    }

    for url in FALLBACK_URLS.iter().filter(|url| **url != webdriver_url) {
        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = ClientBuilder::native().connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(FetchError::WebDriverUnavailable(webdriver_url.to_string()))
}
