// src/cli.rs
//! CLI definitions for manifest-diff
//!
//! Flags given here override the matching values of the config file.

use clap::Parser;
use manifest_diff::report::{ReportFormat, DEFAULT_OUTPUT};
use manifest_diff::DiffConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "manifest-diff")]
#[command(version)]
#[command(about = "Compare two image manifests and report package changes", long_about = None)]
pub struct Cli {
    /// Manifest of the newer image
    #[arg(long)]
    pub new: PathBuf,

    /// Manifest of the older image
    #[arg(long)]
    pub old: PathBuf,

    /// Report file to write
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Release codename used to build the package index
    #[arg(long)]
    pub codename: Option<String>,

    /// Existing package index directory (skips building one)
    #[arg(long)]
    pub apt_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Report format: text or json
    #[arg(long, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Threads used to prefetch changelogs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply flag overrides on top of a loaded config
    pub fn apply(&self, config: &mut DiffConfig) {
        if let Some(codename) = &self.codename {
            config.codename = codename.clone();
        }
        if let Some(dir) = &self.apt_dir {
            config.apt_dir = Some(dir.clone());
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
    }
}
