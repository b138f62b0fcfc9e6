// src/manifest/parser.rs

//! Loader for manifest YAML files.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;

use super::{
    is_snap_identifier, DebEntry, FileEntry, InnerDebEntry, InnerPackageEntry, Manifest,
    PackageEntry, Section, SnapEntry, SnapInfo, SquashEntry, SquashManifest, DEB_MARKER,
    SNAP_MARKER, SQUASH_MARKER,
};
use crate::error::{Error, Result};

/// Top-level entry as written in the document
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default, deserialize_with = "scalar_string")]
    md5: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    version: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    changelog: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    revision: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    tracking: Option<String>,
    /// `None` when the key is absent, `Some(Null)` when it is empty
    #[serde(default, deserialize_with = "present_value")]
    manifest: Option<Value>,
}

/// Entry inside a squash image as written in the document
#[derive(Debug, Deserialize)]
struct RawInnerEntry {
    #[serde(default, deserialize_with = "scalar_string")]
    version: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    revision: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    tracking: Option<String>,
}

type RawDocument = IndexMap<String, Option<IndexMap<String, RawEntry>>>;

/// Accept YAML strings, integers and booleans as text
///
/// Floats are rejected: `1.10` would come back as `1.1`.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) if n.is_f64() => Err(D::Error::custom(format!(
            "ambiguous number {n}, quote it as a string"
        ))),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar value, found {other:?}"
        ))),
    }
}

/// Keep explicit nulls so an empty nested manifest differs from a missing one
fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn require(field: Option<String>, name: &str, location: &str) -> Result<String> {
    field.ok_or_else(|| Error::ManifestError(format!("{location}: missing '{name}'")))
}

/// Parse manifest YAML text
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    if content.trim().is_empty() {
        return Ok(Manifest::new());
    }

    let raw: Option<RawDocument> = serde_yaml::from_str(content)
        .map_err(|e| Error::ManifestError(format!("Malformed manifest document: {e}")))?;

    let mut manifest = Manifest::new();
    for (section_name, entries) in raw.unwrap_or_default() {
        let mut section = Section::new();
        for (identifier, entry) in entries.unwrap_or_default() {
            let location = format!("{section_name}/{identifier}");
            let entry = classify_entry(&identifier, entry, &location)?;
            section.insert(identifier, entry);
        }
        manifest.insert_section(section_name, section);
    }

    Ok(manifest)
}

/// Load a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!("Failed to read manifest {}: {e}", path.display()))
    })?;
    let manifest = parse_manifest(&content).map_err(|e| match e {
        Error::ManifestError(msg) => Error::ManifestError(format!("{}: {msg}", path.display())),
        other => other,
    })?;

    debug!(
        "Loaded manifest {} ({} sections, {} entries)",
        path.display(),
        manifest.section_names().len(),
        manifest.entry_count()
    );
    Ok(manifest)
}

fn classify_entry(identifier: &str, raw: RawEntry, location: &str) -> Result<PackageEntry> {
    let content_hash = require(raw.md5, "md5", location)?;

    if identifier.contains(SQUASH_MARKER) {
        let value = raw
            .manifest
            .ok_or_else(|| Error::ManifestError(format!("{location}: missing 'manifest'")))?;
        return Ok(PackageEntry::Squash(SquashEntry {
            content_hash,
            manifest: parse_squash_manifest(value, location)?,
        }));
    }

    if identifier.contains(DEB_MARKER) {
        return Ok(PackageEntry::Deb(DebEntry {
            content_hash,
            version: require(raw.version, "version", location)?,
            source: raw.source,
            changelog: raw.changelog,
        }));
    }

    if identifier.starts_with(SNAP_MARKER) || raw.revision.is_some() {
        return Ok(PackageEntry::Snap(SnapEntry {
            content_hash,
            info: SnapInfo {
                version: require(raw.version, "version", location)?,
                revision: require(raw.revision, "revision", location)?,
                tracking: require(raw.tracking, "tracking", location)?,
            },
        }));
    }

    Ok(PackageEntry::File(FileEntry {
        content_hash,
        version: raw.version,
    }))
}

fn parse_squash_manifest(value: Value, location: &str) -> Result<SquashManifest> {
    let raw: Option<IndexMap<String, RawInnerEntry>> = serde_yaml::from_value(value)
        .map_err(|e| Error::ManifestError(format!("{location}: invalid nested manifest: {e}")))?;

    let mut manifest = SquashManifest::new();
    for (identifier, entry) in raw.unwrap_or_default() {
        let inner_location = format!("{location}/{identifier}");
        let version = require(entry.version, "version", &inner_location)?;
        let inner = if is_snap_identifier(&identifier) {
            InnerPackageEntry::Snap(SnapInfo {
                version,
                revision: require(entry.revision, "revision", &inner_location)?,
                tracking: require(entry.tracking, "tracking", &inner_location)?,
            })
        } else {
            InnerPackageEntry::Deb(InnerDebEntry {
                version,
                source: entry.source,
            })
        };
        manifest.insert(identifier, inner);
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::EntryKind;

    const SAMPLE: &str = r#"
debs:
  pool/main/f/foo/foo_1.2-3_amd64.deb:
    md5: aaa
    version: 1.2-3
    source: foo
  bar_2.0_all.deb:
    md5: bbb
    version: "2.0"
    changelog: |
      bar (2.0) noble; urgency=medium
squashfs:
  casper/minimal.squashfs:
    md5: ccc
    manifest:
      bash:
        version: 5.2.21-2ubuntu4
      snap:core22:
        version: "20240111"
        revision: 1122
        tracking: latest/stable
snaps:
  snap:firefox:
    md5: ddd
    version: "128.0"
    revision: "4650"
    tracking: latest/stable
boot:
  casper/vmlinuz:
    md5: eee
"#;

    #[test]
    fn test_parse_sample_manifest() {
        let manifest = parse_manifest(SAMPLE).unwrap();
        assert_eq!(manifest.section_names(), vec!["debs", "squashfs", "snaps", "boot"]);

        let debs = manifest.section("debs").unwrap();
        let keys: Vec<&str> = debs.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["pool/main/f/foo/foo_1.2-3_amd64.deb", "bar_2.0_all.deb"]);
        match &debs["bar_2.0_all.deb"] {
            PackageEntry::Deb(d) => {
                assert_eq!(d.version, "2.0");
                assert!(d.changelog.as_deref().unwrap().starts_with("bar (2.0)"));
                assert!(d.source.is_none());
            }
            other => panic!("expected deb, got {other:?}"),
        }

        let squash = &manifest.section("squashfs").unwrap()["casper/minimal.squashfs"];
        match squash {
            PackageEntry::Squash(s) => {
                assert_eq!(s.manifest.len(), 2);
                assert_eq!(s.manifest["bash"].kind(), EntryKind::Deb);
                match &s.manifest["snap:core22"] {
                    InnerPackageEntry::Snap(info) => assert_eq!(info.revision, "1122"),
                    other => panic!("expected snap, got {other:?}"),
                }
            }
            other => panic!("expected squash, got {other:?}"),
        }

        assert_eq!(manifest.section("snaps").unwrap()["snap:firefox"].kind(), EntryKind::Snap);
        assert_eq!(manifest.section("boot").unwrap()["casper/vmlinuz"].kind(), EntryKind::File);
    }

    #[test]
    fn test_null_sections_and_manifests_are_empty() {
        let manifest = parse_manifest(
            "debs:\nsquashfs:\n  a.squashfs:\n    md5: x\n    manifest:\n",
        )
        .unwrap();
        assert!(manifest.section("debs").unwrap().is_empty());
        match &manifest.section("squashfs").unwrap()["a.squashfs"] {
            PackageEntry::Squash(s) => assert!(s.manifest.is_empty()),
            other => panic!("expected squash, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_document() {
        let manifest = parse_manifest("").unwrap();
        assert_eq!(manifest.entry_count(), 0);
    }

    #[test]
    fn test_missing_md5_is_fatal() {
        let err = parse_manifest("debs:\n  a.deb:\n    version: '1'\n").unwrap_err();
        match err {
            Error::ManifestError(msg) => assert!(msg.contains("debs/a.deb") && msg.contains("md5")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_deb_version_is_fatal() {
        assert!(parse_manifest("debs:\n  a.deb:\n    md5: x\n").is_err());
    }

    #[test]
    fn test_missing_squash_manifest_is_fatal() {
        assert!(parse_manifest("squashfs:\n  a.squashfs:\n    md5: x\n").is_err());
    }

    #[test]
    fn test_inner_snap_requires_revision() {
        let doc = "s:\n  a.squashfs:\n    md5: x\n    manifest:\n      snap:lxd:\n        version: '5'\n        tracking: stable\n";
        let err = parse_manifest(doc).unwrap_err();
        assert!(err.to_string().contains("revision"));
    }

    #[test]
    fn test_float_version_is_rejected() {
        let err = parse_manifest("debs:\n  foo_1.10_all.deb:\n    md5: x\n    version: 1.10\n")
            .unwrap_err();
        assert!(matches!(&err, Error::ManifestError(msg) if msg.contains("quote it")));

        let manifest =
            parse_manifest("debs:\n  foo_1.10_all.deb:\n    md5: x\n    version: '1.10'\n")
                .unwrap();
        match &manifest.section("debs").unwrap()["foo_1.10_all.deb"] {
            PackageEntry::Deb(d) => assert_eq!(d.version, "1.10"),
            other => panic!("expected deb, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            parse_manifest("- just\n- a list\n"),
            Err(Error::ManifestError(_))
        ));
    }

    #[test]
    fn test_load_manifest_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let manifest = load_manifest(&path).unwrap();
        assert_eq!(manifest.entry_count(), 5);

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(load_manifest(&missing), Err(Error::IoError(_))));
    }
}
