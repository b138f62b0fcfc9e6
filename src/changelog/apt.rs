// src/changelog/apt.rs

//! Source package resolution through a local apt package index
//!
//! The index directory is a self-contained apt root (sources lists, lists
//! and an empty dpkg status) so `apt show` can answer for any version of a
//! release without touching the host's package state.

use super::SourceIndex;
use crate::config::DiffConfig;
use crate::error::{Error, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Markers apt prints when a package version is unknown
const NOT_FOUND_MARKERS: [&str; 2] = ["No packages found", "Unable to locate package"];

/// Local apt package index
pub struct AptIndex {
    dir: PathBuf,
    timeout: Duration,
    /// Keeps a generated index alive until the run ends
    _temp: Option<TempDir>,
}

impl AptIndex {
    /// Use an existing index directory
    pub fn open(dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::NotFoundError(format!(
                "Package index directory {} does not exist",
                dir.display()
            )));
        }
        Ok(Self {
            dir,
            timeout,
            _temp: None,
        })
    }

    /// Open the configured index, or build one in a temporary directory
    pub fn prepare(config: &DiffConfig) -> Result<Self> {
        if let Some(dir) = &config.apt_dir {
            return Self::open(dir, config.archive_timeout());
        }

        let temp = tempfile::Builder::new()
            .prefix("manifest-diff-apt-")
            .tempdir()
            .map_err(|e| Error::InitError(format!("Failed to create index directory: {e}")))?;

        build_index(&config.setup_command, &config.codename, temp.path())?;

        Ok(Self {
            dir: temp.path().to_path_buf(),
            timeout: config.archive_timeout(),
            _temp: Some(temp),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run `apt show package=version` against the index
    ///
    /// Returns `Ok(None)` when apt does not know the version.
    fn show(&self, package: &str, version: &str) -> Result<Option<String>> {
        let dir = self.dir.to_string_lossy();
        let target = format!("{package}={version}");

        let mut command = Command::new("apt");
        command
            .arg("-o")
            .arg(format!("Dir={dir}"))
            .arg("-o")
            .arg(format!("Dir::State::status={dir}/var/lib/dpkg/status"))
            .arg("show")
            .arg(&target);

        let output = run_with_timeout(&mut command, self.timeout)
            .map_err(|e| Error::ArchiveError(format!("apt show {target}: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m)) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(Error::ArchiveError(format!(
                "apt show {} failed with exit code {}: {}",
                target,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        if stdout.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(stdout.into_owned()))
    }
}

/// Run a command to completion, killing it after `timeout`
///
/// stdout and stderr are drained on reader threads while waiting so a
/// chatty child cannot stall on a full pipe.
fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::ArchiveError(format!("Failed to spawn: {e}")))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    match child.wait_timeout(timeout)? {
        Some(status) => Ok(Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        }),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(Error::ArchiveError(format!(
                "timed out after {} seconds",
                timeout.as_secs()
            )))
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf) {
                warn!("Failed to read child output: {}", e);
            }
        }
        buf
    })
}

fn collect(reader: JoinHandle<Vec<u8>>) -> Vec<u8> {
    reader.join().unwrap_or_default()
}

impl SourceIndex for AptIndex {
    fn resolve_source(&self, package: &str, version: &str) -> Result<Option<String>> {
        Ok(self
            .show(package, version)?
            .map(|control| parse_source_field(&control, package)))
    }
}

/// Run the external index builder
fn build_index(command: &str, codename: &str, dir: &Path) -> Result<()> {
    info!("Building {} package index in {}", codename, dir.display());

    let output = Command::new(command)
        .arg("--codename")
        .arg(codename)
        .arg("--apt-dir")
        .arg(dir)
        .arg("--enable-source")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::InitError(format!("Failed to run {command}: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        warn!("[{}] {}", command, line);
    }

    if !output.status.success() {
        return Err(Error::InitError(format!(
            "{} failed with exit code {}",
            command,
            output.status.code().unwrap_or(-1)
        )));
    }

    debug!("Package index ready in {}", dir.display());
    Ok(())
}

/// Extract the source package name from `apt show` output
///
/// Only the first stanza is considered. A `Source:` value may carry a
/// version in parentheses, which is dropped. Packages without a `Source:`
/// field are their own source.
pub fn parse_source_field(control: &str, package: &str) -> String {
    control
        .lines()
        .take_while(|line| !line.trim().is_empty())
        .find_map(|line| line.strip_prefix("Source:"))
        .and_then(|value| value.split_whitespace().next())
        .unwrap_or(package)
        .to_string()
}
