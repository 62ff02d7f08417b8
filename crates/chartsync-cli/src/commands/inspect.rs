//! Inspect command - list the dependencies of a packaged chart

use console::style;
use std::path::Path;

use chartsync_deps::chart_dependencies;

use crate::error::{CliError, Result};

pub fn run(archive_path: &Path, name: &str, json: bool) -> Result<()> {
    let deps = chart_dependencies(archive_path, name)?;

    if json {
        let output = serde_json::to_string_pretty(&deps)
            .map_err(|e| CliError::internal(format!("serializing dependencies: {}", e)))?;
        println!("{}", output);
        return Ok(());
    }

    println!(
        "{} {} ({})",
        style("Chart").cyan().bold(),
        name,
        archive_path.display()
    );
    println!();

    if deps.is_empty() {
        println!("No dependencies");
        return Ok(());
    }

    println!("{}:", style("Dependencies").bold());
    for dep in &deps {
        println!(
            "  {:30} {:>12}  {}",
            dep.name,
            dep.version,
            style(&dep.repository).dim()
        );
    }

    Ok(())
}
