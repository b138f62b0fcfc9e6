// src/report.rs

//! Report rendering
//!
//! The text report is indentation based. Every diffed section gets its
//! three `<section> <BUCKET>` headings, empty or not, each followed by its
//! identifiers one tab deep. DIFF identifiers are followed by their
//! changelog delta and changed snap fields one level deeper, and squash
//! images by the nested result, whose buckets are labelled at the image's
//! depth. A blank line closes every DIFF entry that printed detail.
//!
//! Rendering only reads the diff tree.

use crate::diff::{ChangedEntry, DiffResult, ManifestDiff};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::path::Path;
use strum_macros::{Display, EnumString};
use tracing::info;

/// Default report path
pub const DEFAULT_OUTPUT: &str = "manifest_diff";

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

fn push_line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push('\t');
    }
    out.push_str(text);
    out.push('\n');
}

/// Render section results as a text report
pub fn render_text(sections: &IndexMap<String, DiffResult>) -> String {
    let mut out = String::new();

    for (section, result) in sections {
        push_line(&mut out, 0, &format!("{section} ADDED"));
        for entry in &result.added {
            push_line(&mut out, 1, &entry.name);
        }
        push_line(&mut out, 0, &format!("{section} REMOVED"));
        for entry in &result.removed {
            push_line(&mut out, 1, &entry.name);
        }
        push_line(&mut out, 0, &format!("{section} DIFF"));
        for entry in &result.changed {
            render_changed(&mut out, entry, 1);
        }
    }

    out
}

fn render_changed(out: &mut String, entry: &ChangedEntry, depth: usize) {
    push_line(out, depth, &entry.name);
    let mut detail = false;

    if let Some(sub) = &entry.subcomponent {
        detail |= render_nested(out, sub, depth);
    }

    if let Some(changelog) = &entry.changelog {
        for line in changelog.split('\n').filter(|l| !l.is_empty()) {
            push_line(out, depth + 1, line);
            detail = true;
        }
    }

    for change in &entry.version_change {
        push_line(out, depth + 1, &format!("{}: {}", change.field, change.summary()));
        detail = true;
    }

    if detail {
        out.push('\n');
    }
}

/// Render a nested result with bucket labels at `depth`; returns whether
/// anything was written
fn render_nested(out: &mut String, result: &DiffResult, depth: usize) -> bool {
    if !result.added.is_empty() {
        push_line(out, depth, "ADDED");
        for entry in &result.added {
            push_line(out, depth + 1, &entry.name);
        }
    }
    if !result.removed.is_empty() {
        push_line(out, depth, "REMOVED");
        for entry in &result.removed {
            push_line(out, depth + 1, &entry.name);
        }
    }
    if !result.changed.is_empty() {
        push_line(out, depth, "DIFF");
        for entry in &result.changed {
            render_changed(out, entry, depth + 1);
        }
    }
    !result.is_empty()
}

/// Render section results as pretty-printed JSON
pub fn render_json(diff: &ManifestDiff) -> Result<String> {
    serde_json::to_string_pretty(diff)
        .map_err(|e| Error::ParseError(format!("Failed to serialize report: {e}")))
}

/// Render a diff in the requested format
pub fn render(diff: &ManifestDiff, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(&diff.sections)),
        ReportFormat::Json => render_json(diff),
    }
}

/// Write a rendered report
pub fn write_report(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| {
        Error::IoError(format!("Failed to write report {}: {e}", path.display()))
    })?;
    info!("Report written to {}", path.display());
    Ok(())
}
