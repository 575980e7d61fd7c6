// src/config.rs

use anyhow::{Context, Result};
use std::{env, path::PathBuf, time::Duration};
use tracing::warn;
use url::Url;

use crate::{
    extract::DEFAULT_CONCURRENCY,
    fetch::{FetchConfig, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT},
    registry::Registry,
};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_ORIGINS: &str = "http://localhost:3000";

/// Process settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub sources_path: Option<PathBuf>,
    pub user_agent: String,
    pub timeout: Duration,
    pub concurrency: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            sources_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            allowed_origins: parse_origins(DEFAULT_ORIGINS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key → value source; unset keys keep defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut s = Settings::default();

        if let Some(v) = get("PORT") {
            s.port = v.trim().parse().with_context(|| format!("PORT={:?}", v))?;
        }
        if let Some(v) = get("RATESCRAPER_SOURCES").filter(|v| !v.trim().is_empty()) {
            s.sources_path = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("RATESCRAPER_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            s.user_agent = v.trim().to_string();
        }
        if let Some(v) = get("RATESCRAPER_TIMEOUT_SECS") {
            let secs: u64 = v
                .trim()
                .parse()
                .with_context(|| format!("RATESCRAPER_TIMEOUT_SECS={:?}", v))?;
            s.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(v) = get("RATESCRAPER_CONCURRENCY") {
            let n: usize = v
                .trim()
                .parse()
                .with_context(|| format!("RATESCRAPER_CONCURRENCY={:?}", v))?;
            s.concurrency = n.max(1);
        }
        if let Some(v) = get("RATESCRAPER_ALLOWED_ORIGINS") {
            s.allowed_origins = parse_origins(&v);
        }

        Ok(s)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
        }
    }

    /// The YAML registry when configured, otherwise the built-in one.
    pub fn registry(&self) -> Result<Registry> {
        match &self.sources_path {
            Some(path) => Registry::from_yaml_file(path),
            None => Ok(Registry::builtin()),
        }
    }
}

/// Comma-separated origins, reduced to `scheme://host[:port]`. Wildcards and
/// unparsable entries are dropped.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match Url::parse(o) {
            Ok(url) if !o.contains('*') && url.host().is_some() => {
                Some(url.origin().ascii_serialization())
            }
            _ => {
                warn!(origin = o, "ignoring CORS origin");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.port, 5000);
        assert_eq!(s.timeout, Duration::from_secs(10));
        assert_eq!(s.concurrency, 4);
        assert!(s.sources_path.is_none());
        assert_eq!(s.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(s.registry().unwrap().len(), 5);
    }

    #[test]
    fn test_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("RATESCRAPER_TIMEOUT_SECS", "3"),
            ("RATESCRAPER_CONCURRENCY", "0"),
            ("RATESCRAPER_USER_AGENT", "rates-bot/1.0"),
            (
                "RATESCRAPER_ALLOWED_ORIGINS",
                "http://localhost:3000, https://bank-fd-scrapper.vercel.app/, https://*.vercel.app",
            ),
        ]))
        .unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.fetch_config().timeout, Duration::from_secs(3));
        assert_eq!(s.fetch_config().user_agent, "rates-bot/1.0");
        assert_eq!(s.concurrency, 1);
        assert_eq!(
            s.allowed_origins,
            vec![
                "http://localhost:3000",
                "https://bank-fd-scrapper.vercel.app"
            ]
        );
    }

    #[test]
    fn test_bad_port() {
        assert!(Settings::from_lookup(lookup(&[("PORT", "http")])).is_err());
    }
}
