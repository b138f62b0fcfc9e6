// src/diff/mod.rs

//! Manifest reconciliation
//!
//! Two manifests are compared section by section. Each section yields a
//! [`DiffResult`] with three buckets:
//!
//! - `ADDED`: identifiers only in the new manifest
//! - `REMOVED`: identifiers only in the old manifest
//! - `DIFF`: identifiers whose content changed, plus removed debs that were
//!   correlated with an added deb of the same source package (renames)
//!
//! Changed debs carry the part of their changelog that is new, snaps the
//! fields that changed, and squash images a nested [`DiffResult`] of the
//! packages they contain.

mod manifest;
mod result;
mod section;
mod similarity;
mod squash;

pub use manifest::{ManifestDiff, ManifestDiffer};
pub use result::{AddedEntry, ChangedEntry, DiffResult, FieldChange, RemovedEntry, SnapField};
pub use section::{changelog_delta, snap_field_changes, DiffEntry, SectionDiffer};
pub use similarity::similarity_ratio;
pub use squash::SquashDiffer;
