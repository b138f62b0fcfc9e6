// src/manifest/mod.rs

//! Image manifests
//!
//! A manifest is a YAML snapshot of a software image: an ordered set of
//! sections, each mapping a package identifier to its metadata. Entries
//! whose identifier names a `.squash` image carry the package list of that
//! image as a nested manifest.
//!
//! # Example manifest.yaml
//!
//! ```yaml
//! debs:
//!   pool/main/f/foo/foo_1.2-3_amd64.deb:
//!     md5: 3b5d5c3712955042212316173ccf37be
//!     version: 1.2-3
//!     source: foo
//! squashfs:
//!   casper/minimal.squashfs:
//!     md5: 8f14e45fceea167a5a36dedd4bea2543
//!     manifest:
//!       bash:
//!         version: 5.2.21-2ubuntu4
//!       snap:firefox:
//!         version: "128.0"
//!         revision: "4650"
//!         tracking: latest/stable
//! ```
//!
//! Manifests are read-only once loaded.

mod parser;

pub use parser::{load_manifest, parse_manifest};

use indexmap::IndexMap;
use serde::Serialize;
use strum_macros::Display;

/// Package entries of one section, in document order
pub type Section = IndexMap<String, PackageEntry>;

/// Package entries inside one squash image, in document order
pub type SquashManifest = IndexMap<String, InnerPackageEntry>;

/// Identifier marker for snap packages inside a squash image
pub const SNAP_MARKER: &str = "snap:";

/// Identifier marker for Debian package files
pub const DEB_MARKER: &str = ".deb";

/// Identifier marker for squash images
pub const SQUASH_MARKER: &str = ".squash";

/// A loaded manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    sections: IndexMap<String, Section>,
}

impl Manifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manifest from already classified sections
    pub fn from_sections(sections: IndexMap<String, Section>) -> Self {
        Self { sections }
    }

    /// Add or replace a section
    pub fn insert_section(&mut self, name: impl Into<String>, section: Section) {
        self.sections.insert(name.into(), section);
    }

    /// Look up a section by name
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Iterate sections in document order
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Section names in document order
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.keys().map(|k| k.as_str()).collect()
    }

    /// Total number of top-level entries across all sections
    pub fn entry_count(&self) -> usize {
        self.sections.values().map(|s| s.len()).sum()
    }

    /// Check whether both manifests declare the same set of sections
    pub fn same_sections(&self, other: &Manifest) -> bool {
        self.sections.len() == other.sections.len()
            && self.sections.keys().all(|k| other.sections.contains_key(k))
    }
}

/// Kind of a manifest entry, derived from its identifier and fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Deb,
    Snap,
    Squash,
    File,
}

/// Snap metadata shared by top-level snap entries and snaps inside images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapInfo {
    pub version: String,
    pub revision: String,
    pub tracking: String,
}

/// A top-level `.deb` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebEntry {
    pub content_hash: String,
    pub version: String,
    /// Source package name, when the manifest records it
    pub source: Option<String>,
    /// Pre-supplied changelog text
    pub changelog: Option<String>,
}

/// A top-level snap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapEntry {
    pub content_hash: String,
    pub info: SnapInfo,
}

/// A nested filesystem image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquashEntry {
    pub content_hash: String,
    pub manifest: SquashManifest,
}

/// Any other artifact (kernel, initrd, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub content_hash: String,
    pub version: Option<String>,
}

/// A top-level manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageEntry {
    Deb(DebEntry),
    Snap(SnapEntry),
    Squash(SquashEntry),
    File(FileEntry),
}

impl PackageEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            PackageEntry::Deb(_) => EntryKind::Deb,
            PackageEntry::Snap(_) => EntryKind::Snap,
            PackageEntry::Squash(_) => EntryKind::Squash,
            PackageEntry::File(_) => EntryKind::File,
        }
    }

    pub fn content_hash(&self) -> &str {
        match self {
            PackageEntry::Deb(e) => &e.content_hash,
            PackageEntry::Snap(e) => &e.content_hash,
            PackageEntry::Squash(e) => &e.content_hash,
            PackageEntry::File(e) => &e.content_hash,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            PackageEntry::Deb(e) => Some(&e.version),
            PackageEntry::Snap(e) => Some(&e.info.version),
            PackageEntry::Squash(_) => None,
            PackageEntry::File(e) => e.version.as_deref(),
        }
    }
}

/// A deb-like package inside a squash image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerDebEntry {
    pub version: String,
    pub source: Option<String>,
}

/// A package inside a squash image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerPackageEntry {
    Deb(InnerDebEntry),
    Snap(SnapInfo),
}

impl InnerPackageEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            InnerPackageEntry::Deb(_) => EntryKind::Deb,
            InnerPackageEntry::Snap(_) => EntryKind::Snap,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            InnerPackageEntry::Deb(e) => &e.version,
            InnerPackageEntry::Snap(s) => &s.version,
        }
    }
}

/// Package name used for archive queries of a `.deb` file: the basename up
/// to the first `_`
pub fn deb_package_name(identifier: &str) -> &str {
    let base = identifier.rsplit('/').next().unwrap_or(identifier);
    base.split('_').next().unwrap_or(base)
}

/// Whether an identifier inside a squash image names a snap
pub fn is_snap_identifier(identifier: &str) -> bool {
    identifier.contains(SNAP_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deb(hash: &str) -> PackageEntry {
        PackageEntry::Deb(DebEntry {
            content_hash: hash.to_string(),
            version: "1.0".to_string(),
            source: None,
            changelog: None,
        })
    }

    #[test]
    fn test_package_name_from_pool_path() {
        assert_eq!(deb_package_name("pool/main/f/foo/foo_1.2-3_amd64.deb"), "foo");
        assert_eq!(deb_package_name("libfoo1_1.2-3_amd64.deb"), "libfoo1");
        assert_eq!(deb_package_name("plain.deb"), "plain.deb");
    }

    #[test]
    fn test_same_sections_ignores_order() {
        let mut a = Manifest::new();
        a.insert_section("debs", Section::new());
        a.insert_section("squashfs", Section::new());
        let mut b = Manifest::new();
        b.insert_section("squashfs", Section::new());
        b.insert_section("debs", Section::new());
        assert!(a.same_sections(&b));

        b.insert_section("extra", Section::new());
        assert!(!a.same_sections(&b));
    }

    #[test]
    fn test_entry_accessors() {
        let mut section = Section::new();
        section.insert("a.deb".to_string(), deb("h1"));
        let mut manifest = Manifest::new();
        manifest.insert_section("debs", section);

        let entry = &manifest.section("debs").unwrap()["a.deb"];
        assert_eq!(entry.kind(), EntryKind::Deb);
        assert_eq!(entry.content_hash(), "h1");
        assert_eq!(entry.version(), Some("1.0"));
        assert_eq!(manifest.entry_count(), 1);
        assert_eq!(EntryKind::Squash.to_string(), "squash");
    }

    #[test]
    fn test_snap_identifier() {
        assert!(is_snap_identifier("snap:firefox"));
        assert!(!is_snap_identifier("firefox"));
    }
}
