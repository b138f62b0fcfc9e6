// src/diff/squash.rs

//! Diff of the package list inside a squash image

use super::result::DiffResult;
use super::section::{DiffEntry, SectionDiffer};
use crate::changelog::{ChangelogLookup, LookupRequest};
use crate::manifest::{EntryKind, InnerPackageEntry, SnapInfo, SquashManifest};

impl DiffEntry for InnerPackageEntry {
    fn kind(&self) -> EntryKind {
        InnerPackageEntry::kind(self)
    }

    /// Inner entries carry no content hash; their metadata is compared
    fn unchanged(&self, old: &Self) -> bool {
        match (self, old) {
            (InnerPackageEntry::Deb(n), InnerPackageEntry::Deb(o)) => n.version == o.version,
            (InnerPackageEntry::Snap(n), InnerPackageEntry::Snap(o)) => n == o,
            _ => false,
        }
    }

    fn lookup_request(&self, identifier: &str) -> Option<LookupRequest> {
        match self {
            InnerPackageEntry::Deb(d) => Some(LookupRequest::new(
                identifier,
                &d.version,
                d.source.as_deref(),
            )),
            InnerPackageEntry::Snap(_) => None,
        }
    }

    fn snap_info(&self) -> Option<&SnapInfo> {
        match self {
            InnerPackageEntry::Snap(info) => Some(info),
            InnerPackageEntry::Deb(_) => None,
        }
    }
}

/// Diffs the package lists of two versions of a squash image
pub struct SquashDiffer<'a> {
    sections: SectionDiffer<'a>,
}

impl<'a> SquashDiffer<'a> {
    pub fn new(lookup: &'a ChangelogLookup) -> Self {
        Self {
            sections: SectionDiffer::new(lookup),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.sections = self.sections.with_threshold(threshold);
        self
    }

    pub fn diff(&self, new: &SquashManifest, old: &SquashManifest) -> DiffResult {
        self.sections.diff(new, old)
    }

    /// Every lookup [`SquashDiffer::diff`] would perform for these images
    pub fn plan_lookups(
        &self,
        new: &SquashManifest,
        old: &SquashManifest,
        out: &mut Vec<LookupRequest>,
    ) {
        self.sections.plan_lookups(new, old, out);
    }
}
