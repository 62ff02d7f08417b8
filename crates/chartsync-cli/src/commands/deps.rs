//! Deps command - move the dependencies of an unpacked chart to the target

use console::style;
use std::path::Path;

use chartsync_deps::DependencySync;

use crate::config::SyncConfig;
use crate::error::{CliError, Result};
use crate::util::short_digest;

pub async fn run(chart_path: &Path, config_path: Option<&Path>, concurrency: usize) -> Result<()> {
    if !chart_path.is_dir() {
        return Err(CliError::Chart {
            message: format!("{} is not a chart directory", chart_path.display()),
        });
    }

    let config = match config_path {
        Some(path) => SyncConfig::load_from(path)?,
        None => SyncConfig::load()?,
    };

    let sync = DependencySync::from_policy(
        config.source.repo.clone(),
        config.target.repo.clone(),
        config.trust_policy(),
    )?
    .with_concurrency(concurrency);

    println!(
        "{} dependencies of {}",
        style("Syncing").cyan().bold(),
        chart_path.display()
    );
    println!("  {}: {}", style("Source").dim(), config.source.repo.url);
    println!("  {}: {}", style("Target").dim(), config.target.repo.url);
    println!();

    let summary = match sync.build_dependencies(chart_path).await {
        Ok(summary) => summary,
        Err(err) => {
            let err = CliError::from(err);
            if let CliError::PartialFailure { failed, .. } = &err {
                println!(
                    "{} {} dependencies could not be built",
                    style("✗").red().bold(),
                    failed.len()
                );
            }
            return Err(err);
        }
    };

    let Some(generation) = summary.generation else {
        println!("{} No dependencies", style("✓").green().bold());
        return Ok(());
    };

    println!("  {}: {}", style("Schema").dim(), generation);
    println!("  {}: {}", style("Rewritten").dim(), summary.rewritten);
    if let Some(digest) = &summary.digest {
        println!("  {}: {}...", style("Digest").dim(), short_digest(digest, 16));
    }
    println!();

    for id in &summary.dependencies {
        println!("  {} {}", style("✓").green(), id);
    }
    println!();
    println!(
        "{} Built {} dependencies",
        style("✓").green().bold(),
        summary.dependencies.len()
    );

    Ok(())
}
