// src/lib.rs

//! Image manifest differ
//!
//! Compares two YAML manifests describing software images and reports what
//! was added, removed and changed in every section. Changed Debian packages
//! are annotated with the changelog entries they gained, snaps with the
//! fields that moved, and squash images with a nested diff of their own
//! package lists.
//!
//! # Architecture
//!
//! - `manifest`: document model and loader
//! - `changelog`: source resolution and changelog retrieval, memoized
//! - `diff`: three-pass section diff with rename correlation
//! - `report`: text and JSON rendering

pub mod changelog;
pub mod config;
pub mod diff;
mod error;
pub mod manifest;
pub mod report;

pub use changelog::{
    AptIndex, CacheStats, ChangelogClient, ChangelogLookup, ChangelogRecord, ChangelogSource,
    SourceIndex,
};
pub use config::DiffConfig;
pub use diff::{
    changelog_delta, similarity_ratio, ChangedEntry, DiffResult, ManifestDiff, ManifestDiffer,
    SquashDiffer,
};
pub use error::{Error, Result};
pub use manifest::{load_manifest, parse_manifest, EntryKind, Manifest, PackageEntry};
pub use report::{render, render_text, write_report, ReportFormat};
