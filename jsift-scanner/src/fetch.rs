use crate::error::{Result, ScanError};
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_RETRIES: u32 = 2;
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 8_000;

/// Page and script fetcher. One fetcher is shared across a whole run so the
/// underlying connection pool gets reused.
pub struct Fetcher {
    client: Client,
    bare_client: Client,
    max_retries: u32,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .user_agent("jsift/0.1 (https://github.com/trapdoorsec/jsift)")
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(timeout_secs / 2))
            .gzip(true)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        // Some WAFs key on the User-Agent header; the bare client is the
        // fallback identity for 403/429 responses.
        let bare_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(timeout_secs / 2))
            .gzip(true)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            bare_client,
            max_retries: MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Fetches a URL body as text. `Ok(None)` means the server answered but
    /// the content is not usable (non-success status after all fallbacks);
    /// `Err` means we could not talk to it at all.
    pub async fn fetch(&self, url: &str) -> Result<Option<String>> {
        let url = ensure_scheme(url)?;
        debug!("fetching {url}");

        let mut attempt = 0;
        loop {
            match self.fetch_once(&url).await {
                Ok(body) => return Ok(body),
                Err(err) if attempt < self.max_retries && is_transient(&err) => {
                    let delay = backoff_delay(attempt);
                    warn!("transient error fetching {url}, retrying in {delay:?}: {err}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(Some(response.text().await?));
        }

        // 403/429 usually means the UA string tripped a filter; retry once
        // with the client that sends no User-Agent at all.
        if matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS) {
            warn!("got {status} for {url}, retrying without user agent");
            let response = self.bare_client.get(url).send().await?;
            if response.status().is_success() {
                debug!("bare-client retry succeeded for {url}");
                return Ok(Some(response.text().await?));
            }
            warn!("bare-client retry got {} for {url}", response.status());
            return Ok(None);
        }

        debug!("unusable status {status} for {url}");
        Ok(None)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn is_transient(err: &ScanError) -> bool {
    match err {
        ScanError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        _ => false,
    }
}

/// Exponential backoff with jitter, capped so a flaky host cannot stall the
/// run for long.
fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS.saturating_mul(1 << attempt).min(BACKOFF_CAP_MS);
    let jitter = rand::thread_rng().gen_range(0..=base / 2);
    Duration::from_millis(base + jitter)
}

/// Bare hostnames from input files get an https scheme prepended.
pub fn ensure_scheme(url: &str) -> Result<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ScanError::InvalidUrl("empty URL".to_string()));
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    Url::parse(&candidate)
        .map_err(|e| ScanError::InvalidUrl(format!("{trimmed}: {e}")))?;
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_ensure_scheme_prepends_https() {
        assert_eq!(ensure_scheme("example.com").unwrap(), "https://example.com");
        assert_eq!(
            ensure_scheme("http://example.com").unwrap(),
            "http://example.com"
        );
        assert!(ensure_scheme("").is_err());
        assert!(ensure_scheme("ht tp://bad url").is_err());
    }

    #[test]
    fn test_backoff_grows_and_stays_capped() {
        for attempt in 0..10 {
            let delay = backoff_delay(attempt);
            assert!(delay <= Duration::from_millis(BACKOFF_CAP_MS + BACKOFF_CAP_MS / 2));
        }
        assert!(backoff_delay(0) >= Duration::from_millis(BACKOFF_BASE_MS));
    }

    #[tokio::test]
    async fn test_fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1);"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new();
        let body = fetcher
            .fetch(&format!("{}/app.js", server.uri()))
            .await
            .unwrap();
        assert_eq!(body.as_deref(), Some("console.log(1);"));
    }

    #[tokio::test]
    async fn test_fetch_falls_back_without_user_agent_on_403() {
        let server = MockServer::start().await;
        // The UA-bearing request is blocked; the bare one is allowed.
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new();
        let body = fetcher
            .fetch(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body.as_deref(), Some("<html></html>"));
    }

    #[tokio::test]
    async fn test_fetch_returns_none_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new();
        let body = fetcher
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap();
        assert!(body.is_none());
    }
}
