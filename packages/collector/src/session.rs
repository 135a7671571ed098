//! Browser-headed fetch sessions.
//!
//! The pipeline talks to pages through the [`Session`] trait so that list
//! parsing and enrichment are testable against fixture HTML. The shipped
//! implementation is a reqwest client dressed up with browser headers and a
//! bounded timeout; a CDP-driven session could implement the same trait
//! without touching the pipeline.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};

/// The outcome of one navigation: where we asked to go, where we ended up
/// after redirects, and the document body.
#[derive(Debug, Clone)]
pub struct NavigatedPage {
    pub requested_url: String,
    pub final_url: String,
    pub html: String,
}

impl NavigatedPage {
    pub fn new(
        requested_url: impl Into<String>,
        final_url: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            requested_url: requested_url.into(),
            final_url: final_url.into(),
            html: html.into(),
        }
    }

    /// Whether the navigation was redirected off the expected path family.
    pub fn left_path_family(&self, expected_fragment: &str) -> bool {
        !self.final_url.contains(expected_fragment)
    }
}

/// One reusable fetch session.
///
/// Sessions are independent: a slow navigation on one never blocks another.
#[async_trait]
pub trait Session: Send + Sync {
    async fn navigate(&self, url: &str) -> FetchResult<NavigatedPage>;
}

/// HTTP session with browser-like headers.
///
/// Keeps its own connection pool and cookie state per session, so a pool of
/// these behaves like a pool of isolated browser contexts for static pages.
pub struct HttpSession {
    client: reqwest::Client,
}

impl HttpSession {
    pub fn new(nav_timeout: Duration) -> FetchResult<Self> {
        let user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                .parse()
                .expect("static header value"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "en-US,en;q=0.5".parse().expect("static header value"),
        );
        headers.insert(
            reqwest::header::UPGRADE_INSECURE_REQUESTS,
            "1".parse().expect("static header value"),
        );

        let client = reqwest::Client::builder()
            .timeout(nav_timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Network(Box::new(e)))?;

        Ok(Self { client })
    }

    /// Build a fixed-size pool of independent sessions.
    pub fn pool(size: usize, nav_timeout: Duration) -> FetchResult<Vec<Self>> {
        (0..size).map(|_| Self::new(nav_timeout)).collect()
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn navigate(&self, url: &str) -> FetchResult<NavigatedPage> {
        tracing::debug!(url = %url, "navigating");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else if e.is_connect() {
                FetchError::SessionClosed
            } else {
                FetchError::Network(Box::new(e))
            }
        })?;

        let status = response.status();
        let final_url = response.url().to_string();

        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(FetchError::Blocked { url: url.to_string() });
        }
        if !status.is_success() {
            return Err(FetchError::Network(
                format!("HTTP {} for {}", status, url).into(),
            ));
        }

        let html = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Network(Box::new(e))
            }
        })?;

        Ok(NavigatedPage::new(url, final_url, html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_family_check_uses_final_url() {
        let page = NavigatedPage::new(
            "https://www.linkedin.com/jobs/view/123456",
            "https://www.linkedin.com/authwall?trk=...",
            "<html></html>",
        );
        assert!(page.left_path_family("/jobs/view/"));

        let ok = NavigatedPage::new(
            "https://www.linkedin.com/jobs/view/123456",
            "https://www.linkedin.com/jobs/view/analyst-123456",
            "<html></html>",
        );
        assert!(!ok.left_path_family("/jobs/view/"));
    }

    #[test]
    fn pool_builds_requested_size() {
        let pool = HttpSession::pool(4, Duration::from_secs(5)).unwrap();
        assert_eq!(pool.len(), 4);
    }
}
