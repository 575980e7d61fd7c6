// src/fetch/mod.rs

use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE},
    redirect, Client,
};
use std::{future::Future, time::Duration};
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

#[cfg(test)]
pub(crate) mod testing;

/// Many bank sites refuse requests that don't look like a desktop browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_REDIRECTS: usize = 10;

/// Markup retrieved for one source.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub address: Url,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Anything that can turn an address into markup.
pub trait Fetch: Send + Sync {
    fn fetch(&self, address: &Url) -> impl Future<Output = Result<RawDocument, FetchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Two-tier HTTP fetcher: a bare GET first, then a fully specified
/// browser-like request if that fails.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    shortcut: Client,
    full: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let shortcut = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let full = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .cookie_store(true)
            .gzip(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { shortcut, full })
    }
}

async fn get_text(client: &Client, url: &Url) -> Result<String, FetchError> {
    debug!("Fetching text from {}", url);
    client
        .get(url.clone())
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| FetchError::from_reqwest(url.as_str(), &e))?
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(url.as_str(), &e))
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, address: &Url) -> Result<RawDocument, FetchError> {
        let body = match get_text(&self.shortcut, address).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %address, error = %e, "shortcut fetch failed, retrying with full request");
                get_text(&self.full, address).await?
            }
        };
        debug!(url = %address, bytes = body.len(), "fetched");
        Ok(RawDocument {
            address: address.clone(),
            body,
            fetched_at: Utc::now(),
        })
    }
}
