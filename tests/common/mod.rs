// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use manifest_diff::{ChangelogLookup, ChangelogSource, Error, Result, SourceIndex};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

type CallLog = Arc<Mutex<HashMap<(String, String), usize>>>;

/// In-memory archive index and changelog repository that counts queries.
///
/// Clones share their call counters, so a test can hand one clone to a
/// [`ChangelogLookup`] and inspect the counts through another.
#[derive(Clone, Default)]
pub struct FakeArchive {
    /// binary package -> source package
    sources: HashMap<String, String>,
    /// (source, version) -> changelog
    changelogs: HashMap<(String, String), String>,
    index_calls: CallLog,
    fetch_calls: CallLog,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, package: &str, source: &str) -> Self {
        self.sources.insert(package.to_string(), source.to_string());
        self
    }

    pub fn with_changelog(mut self, source: &str, version: &str, changelog: &str) -> Self {
        self.changelogs
            .insert((source.to_string(), version.to_string()), changelog.to_string());
        self
    }

    /// Build a lookup backed by this archive
    pub fn lookup(&self) -> ChangelogLookup {
        ChangelogLookup::new(Box::new(self.clone()), Box::new(self.clone()))
    }

    /// Number of changelog fetches issued for `(source, version)`
    pub fn fetches(&self, source: &str, version: &str) -> usize {
        count(&self.fetch_calls, source, version)
    }

    /// Number of index queries issued for `(package, version)`
    pub fn index_queries(&self, package: &str, version: &str) -> usize {
        count(&self.index_calls, package, version)
    }

    /// Every changelog fetch count, keyed by `(source, version)`
    pub fn all_fetches(&self) -> HashMap<(String, String), usize> {
        self.fetch_calls.lock().unwrap().clone()
    }
}

fn count(log: &CallLog, first: &str, second: &str) -> usize {
    log.lock()
        .unwrap()
        .get(&(first.to_string(), second.to_string()))
        .copied()
        .unwrap_or(0)
}

fn record(log: &CallLog, first: &str, second: &str) {
    *log.lock()
        .unwrap()
        .entry((first.to_string(), second.to_string()))
        .or_default() += 1;
}

impl SourceIndex for FakeArchive {
    fn resolve_source(&self, package: &str, version: &str) -> Result<Option<String>> {
        record(&self.index_calls, package, version);
        Ok(self.sources.get(package).cloned())
    }
}

impl ChangelogSource for FakeArchive {
    fn fetch_changelog(&self, source: &str, version: &str) -> Result<String> {
        record(&self.fetch_calls, source, version);
        self.changelogs
            .get(&(source.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| Error::DownloadError(format!("HTTP 404 for {source} {version}")))
    }
}

/// Write manifest YAML into a temp dir.
///
/// Returns (TempDir, path) - keep the TempDir alive to prevent cleanup.
pub fn write_manifest(name: &str, yaml: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, yaml).unwrap();
    (dir, path)
}

/// Release-to-release manifest pair covering every entry kind.
pub const NEW_MANIFEST: &str = r#"
debs:
  pool/main/b/bash/bash_5.2.21-2ubuntu4_amd64.deb:
    md5: b2
    version: 5.2.21-2ubuntu4
  pool/main/o/openssl/libssl3t64_3.0.13-0ubuntu3_amd64.deb:
    md5: s2
    version: 3.0.13-0ubuntu3
  pool/main/c/curl/curl_8.5.0-2ubuntu10_amd64.deb:
    md5: c1
    version: 8.5.0-2ubuntu10
snaps:
  snap:lxd:
    md5: l2
    version: "5.21"
    revision: 30
    tracking: 5.21/stable
boot:
  casper/vmlinuz:
    md5: k2
squashfs:
  casper/minimal.squashfs:
    md5: q2
    manifest:
      bash:
        version: 5.2.21-2ubuntu4
      snap:firefox:
        version: "128.0"
        revision: "4650"
        tracking: latest/stable
"#;

pub const OLD_MANIFEST: &str = r#"
debs:
  pool/main/b/bash/bash_5.2.21-2ubuntu3_amd64.deb:
    md5: b1
    version: 5.2.21-2ubuntu3
  pool/main/o/openssl/libssl3_3.0.2-0ubuntu1_amd64.deb:
    md5: s1
    version: 3.0.2-0ubuntu1
  pool/main/w/wget/wget_1.21.4-1ubuntu4_amd64.deb:
    md5: w1
    version: 1.21.4-1ubuntu4
snaps:
  snap:lxd:
    md5: l1
    version: "5.21"
    revision: 29
    tracking: 5.21/stable
boot:
  casper/vmlinuz:
    md5: k1
squashfs:
  casper/minimal.squashfs:
    md5: q1
    manifest:
      bash:
        version: 5.2.21-2ubuntu3
      snap:chromium:
        version: "126.0"
        revision: "2890"
        tracking: latest/stable
"#;

/// Archive serving the changelogs referenced by the release pair.
pub fn release_archive() -> FakeArchive {
    FakeArchive::new()
        .with_source("bash", "bash")
        .with_source("libssl3", "openssl")
        .with_source("libssl3t64", "openssl")
        .with_source("curl", "curl")
        .with_source("wget", "wget")
        .with_changelog(
            "bash",
            "5.2.21-2ubuntu4",
            "bash (5.2.21-2ubuntu4)\n  * rebuild\nbash (5.2.21-2ubuntu3)\n  * fix\n",
        )
        .with_changelog("bash", "5.2.21-2ubuntu3", "bash (5.2.21-2ubuntu3)\n  * fix\n")
        .with_changelog(
            "openssl",
            "3.0.13-0ubuntu3",
            "openssl (3.0.13-0ubuntu3)\n  * t64\nopenssl (3.0.2-0ubuntu1)\n  * base\n",
        )
        .with_changelog("openssl", "3.0.2-0ubuntu1", "openssl (3.0.2-0ubuntu1)\n  * base\n")
        .with_changelog("curl", "8.5.0-2ubuntu10", "curl (8.5.0-2ubuntu10)\n")
}
