// src/main.rs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use manifest_diff::report;
use manifest_diff::{
    load_manifest, AptIndex, ChangelogClient, ChangelogLookup, DiffConfig, ManifestDiffer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = DiffConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let new = load_manifest(&cli.new)
        .with_context(|| format!("Failed to load new manifest {}", cli.new.display()))?;
    let old = load_manifest(&cli.old)
        .with_context(|| format!("Failed to load old manifest {}", cli.old.display()))?;
    info!(
        "Loaded manifests: {} entries new, {} entries old",
        new.entry_count(),
        old.entry_count()
    );

    let index = AptIndex::prepare(&config).context("Failed to prepare package index")?;
    info!("Using package index at {}", index.dir().display());
    let client = ChangelogClient::from_config(&config)?;
    let lookup = ChangelogLookup::new(Box::new(index), Box::new(client));

    let diff = ManifestDiffer::new(&lookup)
        .with_threshold(config.similarity_threshold)
        .with_jobs(config.jobs)
        .diff(&new, &old);

    for warning in &diff.warnings {
        eprintln!("warning: {warning}");
    }

    let content = report::render(&diff, cli.format)?;
    report::write_report(&cli.output, &content)?;

    if diff.is_empty() {
        println!("No differences");
    } else {
        let changes: usize = diff.sections.values().map(|s| s.len()).sum();
        println!("{} change(s) written to {}", changes, cli.output.display());
    }
    Ok(())
}
