//! Dependencies of a packaged chart

use std::path::Path;
use tempfile::TempDir;

use chartsync_core::{CHART_FILENAME, Dependency, DependencyDocument, extract_archive};

use crate::error::{Result, SyncError};
use crate::schema::load_lock;

/// List the dependencies of the packaged chart `archive`
///
/// `chart_name` is the top-level folder the archive unpacks to. The locked
/// dependencies are returned when the chart has a lock, the ones declared in
/// `Chart.yaml` otherwise.
pub fn chart_dependencies(archive: &Path, chart_name: &str) -> Result<Vec<Dependency>> {
    let workdir = TempDir::new().map_err(|e| SyncError::io("create workdir for", archive, e))?;
    extract_archive(archive, workdir.path())?;

    let chart_root = workdir.path().join(chart_name);
    if let Some(lock) = load_lock(&chart_root)? {
        return Ok(lock.dependencies);
    }

    let metadata = DependencyDocument::load(&chart_root.join(CHART_FILENAME))?;
    Ok(metadata.dependencies()?)
}
