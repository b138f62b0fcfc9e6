// src/changelog/mod.rs

//! Memoized changelog lookup
//!
//! Resolving a changelog takes up to two external queries: the local
//! archive index maps a binary package and version to its source package,
//! and the changelog repository serves the changelog of that source
//! version. Both answers are cached for the lifetime of a
//! [`ChangelogLookup`], including negative answers.
//!
//! Each cache key is populated at most once. Concurrent callers asking for
//! the same key block on the first caller instead of repeating the query.

mod apt;
mod client;

pub use apt::{parse_source_field, AptIndex};
pub use client::ChangelogClient;

use crate::error::Result;
use indexmap::IndexSet;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, warn};

/// Source packages starting with this prefix are pooled by their first
/// four characters
const LIB_PREFIX: &str = "lib";

/// Maps a binary package version to its source package
pub trait SourceIndex: Send + Sync {
    /// Resolve the source package name, `Ok(None)` when the archive does
    /// not know the package version
    fn resolve_source(&self, package: &str, version: &str) -> Result<Option<String>>;
}

/// Serves changelog text for a source package version
pub trait ChangelogSource: Send + Sync {
    fn fetch_changelog(&self, source: &str, version: &str) -> Result<String>;
}

/// A resolved changelog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogRecord {
    /// Source package name
    pub source: String,
    /// Full changelog text, newest entry first
    pub changelog: String,
}

impl ChangelogRecord {
    pub fn new(source: impl Into<String>, changelog: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            changelog: changelog.into(),
        }
    }
}

/// One lookup the diff will perform, used for prefetching
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupRequest {
    pub package: String,
    pub version: String,
    pub source: Option<String>,
}

impl LookupRequest {
    pub fn new(package: &str, version: &str, source: Option<&str>) -> Self {
        Self {
            package: package.to_string(),
            version: version.to_string(),
            source: source.map(str::to_string),
        }
    }
}

/// Query counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls to [`ChangelogLookup::lookup`]
    pub lookups: usize,
    /// Archive index queries actually issued
    pub index_queries: usize,
    /// Changelog fetches actually issued
    pub changelog_fetches: usize,
}

type Slot<T> = Arc<OnceLock<T>>;
type SlotMap<T> = Mutex<HashMap<(String, String), Slot<T>>>;

/// Get the slot for a key, creating an empty one on first use
fn slot<T>(map: &SlotMap<T>, first: &str, second: &str) -> Slot<T> {
    let mut map = map.lock().unwrap_or_else(PoisonError::into_inner);
    map.entry((first.to_string(), second.to_string()))
        .or_default()
        .clone()
}

/// Memoized changelog lookup over an archive index and a changelog source
pub struct ChangelogLookup {
    index: Box<dyn SourceIndex>,
    fetcher: Box<dyn ChangelogSource>,
    /// (package, version) -> source name
    sources: SlotMap<Option<String>>,
    /// (source, version) -> record
    records: SlotMap<Option<Arc<ChangelogRecord>>>,
    lookups: AtomicUsize,
    index_queries: AtomicUsize,
    changelog_fetches: AtomicUsize,
}

impl ChangelogLookup {
    pub fn new(index: Box<dyn SourceIndex>, fetcher: Box<dyn ChangelogSource>) -> Self {
        Self {
            index,
            fetcher,
            sources: Mutex::new(HashMap::new()),
            records: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
            index_queries: AtomicUsize::new(0),
            changelog_fetches: AtomicUsize::new(0),
        }
    }

    /// Look up the changelog of `package` at `version`
    ///
    /// Without a `hint_source` the source package is resolved through the
    /// archive index first; an unknown package version yields `None`
    /// without touching the changelog repository. Query failures also
    /// yield `None` and are logged.
    pub fn lookup(
        &self,
        package: &str,
        version: &str,
        hint_source: Option<&str>,
    ) -> Option<Arc<ChangelogRecord>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let source = match hint_source {
            Some(source) => source.to_string(),
            None => self.resolve_source(package, version)?,
        };
        self.fetch_record(&source, version)
    }

    fn resolve_source(&self, package: &str, version: &str) -> Option<String> {
        let slot = slot(&self.sources, package, version);
        slot.get_or_init(|| {
            self.index_queries.fetch_add(1, Ordering::Relaxed);
            debug!("Resolving source package of {}={}", package, version);
            match self.index.resolve_source(package, version) {
                Ok(Some(source)) => Some(source),
                Ok(None) => {
                    debug!("{}={} not found in archive index", package, version);
                    None
                }
                Err(e) => {
                    warn!("Archive query for {}={} failed: {}", package, version, e);
                    None
                }
            }
        })
        .clone()
    }

    fn fetch_record(&self, source: &str, version: &str) -> Option<Arc<ChangelogRecord>> {
        let slot = slot(&self.records, source, version);
        slot.get_or_init(|| {
            self.changelog_fetches.fetch_add(1, Ordering::Relaxed);
            debug!("Fetching changelog of {} {}", source, version);
            match self.fetcher.fetch_changelog(source, version) {
                Ok(changelog) => Some(Arc::new(ChangelogRecord::new(source, changelog))),
                Err(e) => {
                    warn!("Changelog of {} {} unavailable: {}", source, version, e);
                    None
                }
            }
        })
        .clone()
    }

    /// Warm the cache for a batch of lookups on `jobs` worker threads
    ///
    /// Duplicate requests are collapsed. Results are only cached, so later
    /// sequential lookups see exactly the same answers.
    pub fn prefetch<I>(&self, requests: I, jobs: usize)
    where
        I: IntoIterator<Item = LookupRequest>,
    {
        let unique: Vec<LookupRequest> = requests
            .into_iter()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return;
        }
        debug!("Prefetching {} changelog lookups on {} threads", unique.len(), jobs);

        let run = |r: &LookupRequest| {
            self.lookup(&r.package, &r.version, r.source.as_deref());
        };

        if jobs <= 1 {
            unique.iter().for_each(run);
            return;
        }

        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(|| unique.par_iter().for_each(run)),
            Err(e) => {
                warn!("Failed to start prefetch pool: {}, fetching sequentially", e);
                unique.iter().for_each(run);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            index_queries: self.index_queries.load(Ordering::Relaxed),
            changelog_fetches: self.changelog_fetches.load(Ordering::Relaxed),
        }
    }
}

/// Strip a leading `epoch:` from a Debian version
pub fn strip_epoch(version: &str) -> &str {
    version.split_once(':').map_or(version, |(_, rest)| rest)
}

/// Pool directory of a source package: `libf` for `libfoo`, `f` for `foo`
pub fn pool_prefix(source: &str) -> String {
    let len = if source.starts_with(LIB_PREFIX) { 4 } else { 1 };
    source.chars().take(len).collect()
}

/// Path of a changelog relative to the changelog repository root
pub fn changelog_path(source: &str, version: &str) -> String {
    format!(
        "{}/{}/{}_{}/changelog",
        pool_prefix(source),
        source,
        source,
        strip_epoch(version)
    )
}
