// src/config.rs

//! Run configuration
//!
//! Every field has a default so an empty (or absent) config file is valid.
//! Command-line flags override values read from the file.
//!
//! # Example config.toml
//!
//! ```toml
//! changelog_url = "https://changelogs.ubuntu.com/changelogs/pool/main/"
//! http_timeout_secs = 30
//! similarity_threshold = 0.7
//! jobs = 8
//! codename = "noble"
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default changelog repository
pub const DEFAULT_CHANGELOG_URL: &str = "https://changelogs.ubuntu.com/changelogs/pool/main/";

/// Default release codename for the generated package index
pub const DEFAULT_CODENAME: &str = "noble";

/// Default external package index builder
pub const DEFAULT_SETUP_COMMAND: &str = "setup-apt-dir.sh";

/// Rename correlation requires a similarity strictly greater than this
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.70;

/// Configuration for a diff run
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffConfig {
    /// Base URL of the changelog repository
    pub changelog_url: String,

    /// Timeout for one changelog request
    pub http_timeout_secs: u64,

    /// Timeout for one archive index query
    pub archive_timeout_secs: u64,

    /// Rename correlation threshold
    pub similarity_threshold: f64,

    /// Worker threads for changelog prefetch (1 disables parallelism)
    pub jobs: usize,

    /// Codename passed to the index builder
    pub codename: String,

    /// Existing package index directory; built on demand when unset
    pub apt_dir: Option<PathBuf>,

    /// External index builder command
    pub setup_command: String,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            changelog_url: DEFAULT_CHANGELOG_URL.to_string(),
            http_timeout_secs: 30,
            archive_timeout_secs: 60,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            jobs: 4,
            codename: DEFAULT_CODENAME.to_string(),
            apt_dir: None,
            setup_command: DEFAULT_SETUP_COMMAND.to_string(),
        }
    }
}

impl DiffConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DiffConfig = toml::from_str(content)
            .map_err(|e| Error::ParseError(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load a config file if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Reject values the diff cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::ConfigError(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.jobs == 0 {
            return Err(Error::ConfigError("jobs must be at least 1".to_string()));
        }
        url::Url::parse(&self.changelog_url).map_err(|e| {
            Error::ConfigError(format!("Invalid changelog_url '{}': {e}", self.changelog_url))
        })?;
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }
}
