// src/diff/section.rs

//! Three-pass section diff shared by manifest sections and squash images
//!
//! 1. New identifiers missing from the old section go to an added pool,
//!    together with their changelog record when one can be obtained.
//! 2. Identifiers present on both sides are compared; changed entries
//!    produce a DIFF with a changelog delta, snap field changes, or a
//!    nested diff of a squash image.
//! 3. Old identifiers missing from the new section are removals. A removed
//!    deb is first correlated with the added pool: the first pooled entry
//!    with the same source package and an identifier similarity above the
//!    threshold turns the pair into a single DIFF under the new name.
//!
//! What is left in the pool becomes ADDED, in encounter order.
//!
//! Correlation is greedy: the pool is scanned in insertion order and the
//! first qualifying entry wins, even if a later one is more similar.

use super::result::{AddedEntry, ChangedEntry, DiffResult, FieldChange, RemovedEntry, SnapField};
use super::similarity::similarity_ratio;
use super::squash::SquashDiffer;
use crate::changelog::{ChangelogLookup, ChangelogRecord, LookupRequest};
use crate::config::DEFAULT_SIMILARITY_THRESHOLD;
use crate::manifest::{EntryKind, SnapInfo, SquashManifest};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// An entry the section diff can compare
pub trait DiffEntry {
    fn kind(&self) -> EntryKind;

    /// Whether the entry is the same as its counterpart in the old section
    fn unchanged(&self, old: &Self) -> bool;

    /// Changelog lookup for this entry, `None` for kinds without changelogs
    fn lookup_request(&self, identifier: &str) -> Option<LookupRequest>;

    /// Complete changelog record carried by the manifest itself
    fn inline_record(&self) -> Option<ChangelogRecord> {
        None
    }

    /// Changelog text carried by the manifest itself
    fn inline_changelog(&self) -> Option<&str> {
        None
    }

    fn snap_info(&self) -> Option<&SnapInfo> {
        None
    }

    /// Package list of a squash image
    fn nested_manifest(&self) -> Option<&SquashManifest> {
        None
    }
}

/// An added identifier waiting for rename correlation
struct PoolEntry {
    name: String,
    record: Option<Arc<ChangelogRecord>>,
}

/// Section diff engine
pub struct SectionDiffer<'a> {
    lookup: &'a ChangelogLookup,
    threshold: f64,
}

impl<'a> SectionDiffer<'a> {
    pub fn new(lookup: &'a ChangelogLookup) -> Self {
        Self {
            lookup,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Set the rename correlation threshold (similarity must exceed it)
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn lookup(&self) -> &'a ChangelogLookup {
        self.lookup
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Differ for the package lists of squash images in this section
    fn squash_differ(&self) -> SquashDiffer<'a> {
        SquashDiffer::new(self.lookup).with_threshold(self.threshold)
    }

    /// Diff two versions of a section
    pub fn diff<E: DiffEntry>(
        &self,
        new: &IndexMap<String, E>,
        old: &IndexMap<String, E>,
    ) -> DiffResult {
        let mut result = DiffResult::new();
        let mut pool: Vec<PoolEntry> = Vec::new();

        for (name, entry) in new {
            let Some(old_entry) = old.get(name) else {
                let record = match entry.kind() {
                    EntryKind::Deb => self.record_for(name, entry),
                    _ => None,
                };
                pool.push(PoolEntry {
                    name: name.clone(),
                    record,
                });
                continue;
            };

            if entry.unchanged(old_entry) {
                continue;
            }
            result.changed.push(self.changed_entry(name, entry, old_entry));
        }

        for (name, entry) in old.iter().filter(|(name, _)| !new.contains_key(*name)) {
            if entry.kind() == EntryKind::Deb {
                if let Some(renamed) = self.correlate(name, entry, &mut pool) {
                    result.changed.push(renamed);
                    continue;
                }
            }
            result.removed.push(RemovedEntry::new(name.as_str()));
        }

        result.added = pool
            .into_iter()
            .map(|p| AddedEntry {
                name: p.name,
                changelog: p.record.map(|r| r.changelog.clone()),
            })
            .collect();

        result
    }

    /// Match a removed deb against the added pool
    fn correlate<E: DiffEntry>(
        &self,
        name: &str,
        entry: &E,
        pool: &mut Vec<PoolEntry>,
    ) -> Option<ChangedEntry> {
        let removed = self.record_for(name, entry)?;

        let position = pool.iter().position(|candidate| {
            candidate
                .record
                .as_ref()
                .is_some_and(|r| r.source == removed.source)
                && similarity_ratio(name, &candidate.name) > self.threshold
        })?;

        let candidate = pool.remove(position);
        let added = candidate.record?;
        debug!("Correlated {} -> {} (source {})", name, candidate.name, added.source);

        Some(ChangedEntry::renamed(
            candidate.name,
            name,
            changelog_delta(&added.changelog, &removed.changelog),
        ))
    }

    fn changed_entry<E: DiffEntry>(&self, name: &str, new: &E, old: &E) -> ChangedEntry {
        match new.kind() {
            EntryKind::Snap => match (new.snap_info(), old.snap_info()) {
                (Some(n), Some(o)) => ChangedEntry::with_fields(name, snap_field_changes(n, o)),
                _ => ChangedEntry::bare(name),
            },
            EntryKind::Deb => {
                let new_log = self.changelog_text(name, new);
                let old_log = self.changelog_text(name, old);
                let delta = match (new_log, old_log) {
                    (Some(n), Some(o)) => Some(changelog_delta(&n, &o)),
                    _ => {
                        debug!("No changelog delta for {}", name);
                        None
                    }
                };
                ChangedEntry::with_changelog(name, delta)
            }
            EntryKind::Squash => match (new.nested_manifest(), old.nested_manifest()) {
                (Some(n), Some(o)) => {
                    ChangedEntry::with_subcomponent(name, self.squash_differ().diff(n, o))
                }
                _ => ChangedEntry::bare(name),
            },
            EntryKind::File => ChangedEntry::bare(name),
        }
    }

    /// Record used for pooling and correlation: inline data, else a lookup
    fn record_for<E: DiffEntry>(&self, name: &str, entry: &E) -> Option<Arc<ChangelogRecord>> {
        if let Some(record) = entry.inline_record() {
            return Some(Arc::new(record));
        }
        let request = entry.lookup_request(name)?;
        self.lookup
            .lookup(&request.package, &request.version, request.source.as_deref())
    }

    /// Changelog text of one side of a changed entry
    fn changelog_text<E: DiffEntry>(&self, name: &str, entry: &E) -> Option<String> {
        if let Some(changelog) = entry.inline_changelog() {
            return Some(changelog.to_string());
        }
        let request = entry.lookup_request(name)?;
        self.lookup
            .lookup(&request.package, &request.version, request.source.as_deref())
            .map(|r| r.changelog.clone())
    }

    /// Every lookup [`SectionDiffer::diff`] would perform for these sections
    pub fn plan_lookups<E: DiffEntry>(
        &self,
        new: &IndexMap<String, E>,
        old: &IndexMap<String, E>,
        out: &mut Vec<LookupRequest>,
    ) {
        for (name, entry) in new {
            let Some(old_entry) = old.get(name) else {
                if entry.kind() == EntryKind::Deb && entry.inline_record().is_none() {
                    out.extend(entry.lookup_request(name));
                }
                continue;
            };
            if entry.unchanged(old_entry) {
                continue;
            }
            match entry.kind() {
                EntryKind::Deb => {
                    for side in [entry, old_entry] {
                        if side.inline_changelog().is_none() {
                            out.extend(side.lookup_request(name));
                        }
                    }
                }
                EntryKind::Squash => {
                    if let (Some(n), Some(o)) = (entry.nested_manifest(), old_entry.nested_manifest())
                    {
                        self.squash_differ().plan_lookups(n, o, out);
                    }
                }
                EntryKind::Snap | EntryKind::File => {}
            }
        }

        for (name, entry) in old.iter().filter(|(name, _)| !new.contains_key(*name)) {
            if entry.kind() == EntryKind::Deb && entry.inline_record().is_none() {
                out.extend(entry.lookup_request(name));
            }
        }
    }
}

/// Changed snap fields, in version / revision / tracking order
pub fn snap_field_changes(new: &SnapInfo, old: &SnapInfo) -> Vec<FieldChange> {
    [
        (SnapField::Version, &old.version, &new.version),
        (SnapField::Revision, &old.revision, &new.revision),
        (SnapField::Tracking, &old.tracking, &new.tracking),
    ]
    .into_iter()
    .filter(|(_, o, n)| o != n)
    .map(|(field, o, n)| FieldChange {
        field,
        old: o.clone(),
        new: n.clone(),
    })
    .collect()
}

/// Text of `new` preceding the first occurrence of `old`
///
/// Changelogs list the newest entry first, so the old changelog is expected
/// to appear inside the new one and everything before it is what changed.
/// When `old` does not occur in `new`, the delta is `new` without its last
/// character: the cut lands one position before the end, as if the match
/// index were -1. That output is usually wrong and is logged.
pub fn changelog_delta(new: &str, old: &str) -> String {
    match new.find(old) {
        Some(pos) => new[..pos].to_string(),
        None => {
            warn!("Old changelog not found in new changelog, delta is unreliable");
            let mut delta = new.to_string();
            delta.pop();
            delta
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(version: &str, revision: &str, tracking: &str) -> SnapInfo {
        SnapInfo {
            version: version.to_string(),
            revision: revision.to_string(),
            tracking: tracking.to_string(),
        }
    }

    #[test]
    fn test_delta_prefix() {
        assert_eq!(changelog_delta("v3\nv2\nv1\n", "v2\nv1\n"), "v3\n");
    }

    #[test]
    fn test_delta_identical() {
        assert_eq!(changelog_delta("v1\n", "v1\n"), "");
    }

    #[test]
    fn test_delta_empty_old() {
        assert_eq!(changelog_delta("v2\nv1\n", ""), "");
    }

    #[test]
    fn test_delta_old_not_found_drops_last_char() {
        assert_eq!(changelog_delta("v2\nv1\n", "unrelated\n"), "v2\nv1");
        assert_eq!(changelog_delta("", "x"), "");
    }

    #[test]
    fn test_delta_multibyte_last_char() {
        assert_eq!(changelog_delta("naïve é", "zzz"), "naïve ");
    }

    #[test]
    fn test_snap_field_changes_only_differing() {
        let changes = snap_field_changes(
            &snap("1.0", "20", "latest/stable"),
            &snap("1.0", "19", "latest/stable"),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, SnapField::Revision);
        assert_eq!(changes[0].summary(), "19 -> 20");
    }

    #[test]
    fn test_snap_field_changes_order() {
        let changes = snap_field_changes(&snap("2", "2", "edge"), &snap("1", "1", "stable"));
        let fields: Vec<SnapField> = changes.iter().map(|c| c.field).collect();
        assert_eq!(fields, vec![SnapField::Version, SnapField::Revision, SnapField::Tracking]);
    }
}
