//! Rebuilding the `charts/` folder of a chart
//!
//! Every dependency archive is fetched again, either from the target
//! repository or, for dependencies living in an ignored trusted repository,
//! from that repository's own client. A dependency that cannot be fetched
//! or copied does not stop the others.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chartsync_core::{CHARTS_DIR, Dependency};
use chartsync_repo::ChartsReader;

use crate::error::{DependencyErrors, FailureCause, Result, SyncError};
use crate::trust::{LocationId, LocationMapper, SourceClients, TrustClassifier};

/// Default number of dependencies fetched at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Where a dependency archive is fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    /// The target repository
    Target,
    /// The source-side client registered for this location
    Source(LocationId),
}

/// Fetches dependency archives into `charts/`
pub struct Materializer {
    target: Arc<dyn ChartsReader>,
    source_clients: Arc<SourceClients>,
    classifier: Arc<dyn TrustClassifier>,
    mapper: Arc<dyn LocationMapper>,
    concurrency: usize,
}

impl Materializer {
    pub fn new(
        target: Arc<dyn ChartsReader>,
        source_clients: Arc<SourceClients>,
        classifier: Arc<dyn TrustClassifier>,
        mapper: Arc<dyn LocationMapper>,
    ) -> Self {
        Self {
            target,
            source_clients,
            classifier,
            mapper,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set how many dependencies are fetched at once (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Origin of `dep`, decided on its repository before any rewrite
    pub fn origin(&self, dep: &Dependency) -> FetchOrigin {
        if self.classifier.is_ignored(&dep.repository) {
            FetchOrigin::Source(self.mapper.location_id(&dep.repository))
        } else {
            FetchOrigin::Target
        }
    }

    /// Recreate `charts/` under `chart_root` and fill it with `deps`
    ///
    /// Dependencies sharing a `name-version` land in the same archive, so
    /// only the first of them is fetched. Returns the paths of the
    /// materialized archives. When some dependencies fail, the others are
    /// still in place and the error lists every failure in `deps` order.
    pub async fn materialize(&self, chart_root: &Path, deps: &[Dependency]) -> Result<Vec<PathBuf>> {
        let charts_dir = prepare_charts_dir(chart_root).await?;
        let charts_dir = charts_dir.as_path();

        let deps = unique_dependencies(deps);
        let mut results: Vec<_> = stream::iter(deps.into_iter().enumerate())
            .map(|(index, dep)| async move { (index, dep, self.materialize_one(dep, charts_dir).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut archives = Vec::with_capacity(results.len());
        let mut errors = DependencyErrors::new();
        for (_, dep, result) in results {
            match result {
                Ok(archive) => archives.push(archive),
                Err(cause) => {
                    tracing::warn!(
                        "Failed building {} chart dependency: {}. The dependencies will remain incomplete.",
                        dep.id(),
                        cause
                    );
                    errors.push(dep.id(), cause);
                }
            }
        }

        errors.into_result()?;
        Ok(archives)
    }

    async fn materialize_one(
        &self,
        dep: &Dependency,
        charts_dir: &Path,
    ) -> std::result::Result<PathBuf, FailureCause> {
        let id = dep.id();
        let client = match self.origin(dep) {
            FetchOrigin::Target => &self.target,
            FetchOrigin::Source(location) => {
                self.source_clients
                    .get(&location)
                    .ok_or_else(|| FailureCause::MissingClient {
                        url: dep.repository.clone(),
                    })?
            }
        };
        tracing::debug!("Building {} chart dependency from {}", id, client.url());

        let archive = client
            .fetch(&dep.name, &dep.version)
            .await
            .map_err(FailureCause::Fetch)?;

        let dest = charts_dir.join(dep.archive_name());
        tokio::fs::copy(&archive, &dest)
            .await
            .map_err(|source| FailureCause::Copy {
                dest: dest.clone(),
                source,
            })?;
        Ok(dest)
    }
}

/// First dependency of each `name-version`, in order
pub fn unique_dependencies(deps: &[Dependency]) -> Vec<&Dependency> {
    let mut seen = HashSet::new();
    deps.iter()
        .filter(|dep| {
            let first = seen.insert(dep.id());
            if !first {
                tracing::debug!("Skipping duplicate chart dependency {}", dep.id());
            }
            first
        })
        .collect()
}

/// Delete and recreate the `charts/` folder of the chart in `chart_root`
pub async fn prepare_charts_dir(chart_root: &Path) -> Result<PathBuf> {
    let charts_dir = chart_root.join(CHARTS_DIR);
    match tokio::fs::remove_dir_all(&charts_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(SyncError::io("remove", &charts_dir, e)),
    }
    tokio::fs::create_dir(&charts_dir)
        .await
        .map_err(|e| SyncError::io("create", &charts_dir, e))?;
    Ok(charts_dir)
}
