// src/changelog/client.rs

//! HTTP client for the changelog repository

use super::{changelog_path, ChangelogSource};
use crate::config::DiffConfig;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Maximum attempts for requests that fail before a response arrives
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 500;

/// Fetches changelogs laid out as `<pool>/<source>/<source>_<version>/changelog`
pub struct ChangelogClient {
    client: Client,
    base: Url,
    max_retries: u32,
}

impl ChangelogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // Url::join drops the last path segment unless the base ends in '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&normalized).map_err(|e| {
            Error::InitError(format!("Invalid changelog URL '{base_url}': {e}"))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            max_retries: MAX_RETRIES,
        })
    }

    pub fn from_config(config: &DiffConfig) -> Result<Self> {
        Self::new(&config.changelog_url, config.http_timeout())
    }

    /// Full URL of a changelog
    pub fn changelog_url(&self, source: &str, version: &str) -> Result<Url> {
        self.base
            .join(&changelog_path(source, version))
            .map_err(|e| Error::ParseError(format!("Invalid changelog path for {source}: {e}")))
    }
}

impl ChangelogSource for ChangelogClient {
    /// Non-success statuses fail immediately; transport errors are retried
    fn fetch_changelog(&self, source: &str, version: &str) -> Result<String> {
        let url = self.changelog_url(source, version)?;
        debug!("GET {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url.clone()).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    return response.text().map_err(|e| {
                        Error::DownloadError(format!("Failed to read response from {url}: {e}"))
                    });
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Fetch attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}
