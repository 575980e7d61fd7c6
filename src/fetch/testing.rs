// src/fetch/testing.rs

use chrono::Utc;
use std::{collections::HashMap, time::Duration};
use url::Url;

use super::{Fetch, RawDocument};
use crate::error::FetchError;

/// Serves canned markup per address; unknown addresses fail like a dead host.
#[derive(Debug, Default)]
pub(crate) struct StaticFetcher {
    pages: HashMap<String, Result<String, FetchError>>,
    delay: Option<Duration>,
    slow: HashMap<String, Duration>,
}

impl StaticFetcher {
    pub(crate) fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub(crate) fn failing(mut self, url: &str, err: FetchError) -> Self {
        self.pages.insert(url.to_string(), Err(err));
        self
    }

    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Per-address latency, overriding [`StaticFetcher::delay`].
    pub(crate) fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.slow.insert(url.to_string(), delay);
        self
    }
}

impl Fetch for StaticFetcher {
    async fn fetch(&self, address: &Url) -> Result<RawDocument, FetchError> {
        let delay = self.slow.get(address.as_str()).copied().or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.pages.get(address.as_str()) {
            Some(Ok(body)) => Ok(RawDocument {
                address: address.clone(),
                body: body.clone(),
                fetched_at: Utc::now(),
            }),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::Transport {
                url: address.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}
