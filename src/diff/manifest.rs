// src/diff/manifest.rs

//! Diff of two complete manifests, section by section

use super::result::DiffResult;
use super::section::{DiffEntry, SectionDiffer};
use crate::changelog::{ChangelogLookup, ChangelogRecord, LookupRequest};
use crate::manifest::{
    deb_package_name, EntryKind, Manifest, PackageEntry, Section, SnapInfo, SquashManifest,
};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

impl DiffEntry for PackageEntry {
    fn kind(&self) -> EntryKind {
        PackageEntry::kind(self)
    }

    fn unchanged(&self, old: &Self) -> bool {
        self.content_hash() == old.content_hash()
    }

    fn lookup_request(&self, identifier: &str) -> Option<LookupRequest> {
        match self {
            PackageEntry::Deb(d) => Some(LookupRequest::new(
                deb_package_name(identifier),
                &d.version,
                d.source.as_deref(),
            )),
            _ => None,
        }
    }

    fn inline_record(&self) -> Option<ChangelogRecord> {
        match self {
            PackageEntry::Deb(d) => match (&d.source, &d.changelog) {
                (Some(source), Some(changelog)) => {
                    Some(ChangelogRecord::new(source.as_str(), changelog.as_str()))
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn inline_changelog(&self) -> Option<&str> {
        match self {
            PackageEntry::Deb(d) => d.changelog.as_deref(),
            _ => None,
        }
    }

    fn snap_info(&self) -> Option<&SnapInfo> {
        match self {
            PackageEntry::Snap(s) => Some(&s.info),
            _ => None,
        }
    }

    fn nested_manifest(&self) -> Option<&SquashManifest> {
        match self {
            PackageEntry::Squash(s) => Some(&s.manifest),
            _ => None,
        }
    }
}

/// Result of diffing two manifests
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManifestDiff {
    /// Per-section results, in the new manifest's section order
    #[serde(flatten)]
    pub sections: IndexMap<String, DiffResult>,

    /// Problems that did not stop the diff
    #[serde(skip)]
    pub warnings: Vec<String>,
}

impl ManifestDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no section has any change
    pub fn is_empty(&self) -> bool {
        self.sections.values().all(DiffResult::is_empty)
    }

    pub fn section(&self, name: &str) -> Option<&DiffResult> {
        self.sections.get(name)
    }

    fn add_warning(&mut self, warning: String) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Diffs two manifests
pub struct ManifestDiffer<'a> {
    sections: SectionDiffer<'a>,
    jobs: usize,
}

impl<'a> ManifestDiffer<'a> {
    pub fn new(lookup: &'a ChangelogLookup) -> Self {
        Self {
            sections: SectionDiffer::new(lookup),
            jobs: 1,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.sections = self.sections.with_threshold(threshold);
        self
    }

    /// Number of threads used to prefetch changelogs
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Diff every section present in both manifests
    ///
    /// Sections present in only one manifest are skipped with a warning.
    pub fn diff(&self, new: &Manifest, old: &Manifest) -> ManifestDiff {
        let mut result = ManifestDiff::new();

        if !new.same_sections(old) {
            result.add_warning(format!(
                "Section mismatch between manifests: new has [{}], old has [{}]",
                new.section_names().join(", "),
                old.section_names().join(", ")
            ));
        }

        self.prefetch(new, old);

        for (name, new_section) in new.sections() {
            let Some(old_section) = old.section(name) else {
                result.add_warning(format!("Section '{name}' missing from old manifest, skipped"));
                continue;
            };
            let section_diff = self.diff_section(new_section, old_section);
            debug!(
                "Section {}: {} added, {} removed, {} changed",
                name,
                section_diff.added.len(),
                section_diff.removed.len(),
                section_diff.changed.len()
            );
            result.sections.insert(name.to_string(), section_diff);
        }

        for name in old.section_names() {
            if new.section(name).is_none() {
                result.add_warning(format!("Section '{name}' missing from new manifest, skipped"));
            }
        }

        let stats = self.sections.lookup().stats();
        info!(
            "Diff complete: {} lookups, {} archive queries, {} changelog fetches",
            stats.lookups, stats.index_queries, stats.changelog_fetches
        );
        result
    }

    /// Diff one section
    pub fn diff_section(&self, new: &Section, old: &Section) -> DiffResult {
        self.sections.diff(new, old)
    }

    /// Warm the changelog cache for everything [`ManifestDiffer::diff`]
    /// will look up
    pub fn prefetch(&self, new: &Manifest, old: &Manifest) {
        if self.jobs <= 1 {
            return;
        }
        let mut requests = Vec::new();
        for (name, new_section) in new.sections() {
            if let Some(old_section) = old.section(name) {
                self.sections.plan_lookups(new_section, old_section, &mut requests);
            }
        }
        self.sections.lookup().prefetch(requests, self.jobs);
    }
}
