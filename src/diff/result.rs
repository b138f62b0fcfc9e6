// src/diff/result.rs

//! Diff result tree

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use strum_macros::Display;

/// Three-way diff of one section or one squash image
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffResult {
    #[serde(rename = "ADDED")]
    pub added: Vec<AddedEntry>,

    #[serde(rename = "REMOVED")]
    pub removed: Vec<RemovedEntry>,

    #[serde(rename = "DIFF")]
    pub changed: Vec<ChangedEntry>,
}

impl DiffResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing was added, removed or changed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Total number of entries across the three buckets
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    pub fn added_names(&self) -> Vec<&str> {
        self.added.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn removed_names(&self) -> Vec<&str> {
        self.removed.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn changed_names(&self) -> Vec<&str> {
        self.changed.iter().map(|e| e.name.as_str()).collect()
    }

    /// Find a DIFF entry by identifier
    pub fn changed_entry(&self, name: &str) -> Option<&ChangedEntry> {
        self.changed.iter().find(|e| e.name == name)
    }
}

/// An identifier present only in the new manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedEntry {
    pub name: String,

    /// Full changelog, when one was obtained
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
}

/// An identifier present only in the old manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedEntry {
    pub name: String,
}

impl RemovedEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A changed entry, or a removed entry correlated with an added one
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangedEntry {
    pub name: String,

    /// New changelog text not present in the old changelog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,

    /// Changed snap fields
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_field_changes"
    )]
    pub version_change: Vec<FieldChange>,

    /// Diff of the packages inside a squash image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcomponent: Option<Box<DiffResult>>,

    /// Old identifier when this entry is a rename
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
}

impl ChangedEntry {
    /// A change with no detail beyond the identifier
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_changelog(name: impl Into<String>, changelog: Option<String>) -> Self {
        Self {
            name: name.into(),
            changelog,
            ..Self::default()
        }
    }

    pub fn with_fields(name: impl Into<String>, version_change: Vec<FieldChange>) -> Self {
        Self {
            name: name.into(),
            version_change,
            ..Self::default()
        }
    }

    pub fn with_subcomponent(name: impl Into<String>, sub: DiffResult) -> Self {
        Self {
            name: name.into(),
            subcomponent: Some(Box::new(sub)),
            ..Self::default()
        }
    }

    pub fn renamed(name: impl Into<String>, from: impl Into<String>, changelog: String) -> Self {
        Self {
            name: name.into(),
            changelog: Some(changelog),
            renamed_from: Some(from.into()),
            ..Self::default()
        }
    }

    /// Look up the change of one snap field
    pub fn field_change(&self, field: SnapField) -> Option<&FieldChange> {
        self.version_change.iter().find(|c| c.field == field)
    }
}

/// Snap fields compared for changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SnapField {
    Version,
    Revision,
    Tracking,
}

/// One changed snap field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: SnapField,
    pub old: String,
    pub new: String,
}

impl FieldChange {
    /// `old -> new`
    pub fn summary(&self) -> String {
        format!("{} -> {}", self.old, self.new)
    }
}

/// Serialize field changes as `{field: "old -> new"}`
#[allow(clippy::ptr_arg)]
fn serialize_field_changes<S>(changes: &Vec<FieldChange>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(changes.len()))?;
    for change in changes {
        map.serialize_entry(&change.field, &change.summary())?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result() {
        let result = DiffResult::new();
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
    }

    #[test]
    fn test_json_shape() {
        let mut result = DiffResult::new();
        result.added.push(AddedEntry {
            name: "new.deb".to_string(),
            changelog: None,
        });
        result.changed.push(ChangedEntry::with_fields(
            "snap:lxd",
            vec![FieldChange {
                field: SnapField::Revision,
                old: "1".to_string(),
                new: "2".to_string(),
            }],
        ));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ADDED"][0]["name"], "new.deb");
        assert!(json["ADDED"][0].get("changelog").is_none());
        assert_eq!(json["REMOVED"].as_array().unwrap().len(), 0);
        assert_eq!(json["DIFF"][0]["version_change"]["revision"], "1 -> 2");
        assert!(json["DIFF"][0].get("subcomponent").is_none());
    }

    #[test]
    fn test_field_lookup() {
        let entry = ChangedEntry::with_fields(
            "snap:lxd",
            vec![FieldChange {
                field: SnapField::Tracking,
                old: "5.0/stable".to_string(),
                new: "5.21/stable".to_string(),
            }],
        );
        assert!(entry.field_change(SnapField::Version).is_none());
        assert_eq!(
            entry.field_change(SnapField::Tracking).unwrap().summary(),
            "5.0/stable -> 5.21/stable"
        );
        assert_eq!(SnapField::Tracking.to_string(), "tracking");
    }
}
