//! Schema generation detection and lock loading
//!
//! The generation of a chart is decided by which lock file it ships:
//! `requirements.lock` means Legacy, `Chart.lock` means Modern. A chart
//! without a lock can still be Modern when its `Chart.yaml` declares
//! apiVersion v2 with inline dependencies; any other chart without a lock has
//! no dependencies at all.

use std::path::{Path, PathBuf};

use chartsync_core::{ChartLock, DependencyDocument, SchemaGeneration};

use crate::error::{Result, SyncError};

/// Dependency layout of a chart, with its lock if any
#[derive(Debug, Clone)]
pub enum ChartSchema {
    /// `requirements.yaml` + `requirements.lock`
    Legacy {
        requirements: PathBuf,
        lock_path: PathBuf,
        lock: ChartLock,
    },
    /// `Chart.yaml` + optional `Chart.lock`
    Modern {
        chart_file: PathBuf,
        lock_path: PathBuf,
        lock: Option<ChartLock>,
    },
}

impl ChartSchema {
    pub fn generation(&self) -> SchemaGeneration {
        match self {
            Self::Legacy { .. } => SchemaGeneration::Legacy,
            Self::Modern { .. } => SchemaGeneration::Modern,
        }
    }

    /// File holding the dependency declarations
    pub fn declarations_path(&self) -> &Path {
        match self {
            Self::Legacy { requirements, .. } => requirements,
            Self::Modern { chart_file, .. } => chart_file,
        }
    }

    /// File the lock is (or would be) stored in
    pub fn lock_path(&self) -> &Path {
        match self {
            Self::Legacy { lock_path, .. } | Self::Modern { lock_path, .. } => lock_path,
        }
    }

    pub fn lock(&self) -> Option<&ChartLock> {
        match self {
            Self::Legacy { lock, .. } => Some(lock),
            Self::Modern { lock, .. } => lock.as_ref(),
        }
    }

    /// Split into the declarations path, the lock path and the lock
    pub fn into_parts(self) -> (PathBuf, PathBuf, Option<ChartLock>) {
        match self {
            Self::Legacy {
                requirements,
                lock_path,
                lock,
            } => (requirements, lock_path, Some(lock)),
            Self::Modern {
                chart_file,
                lock_path,
                lock,
            } => (chart_file, lock_path, lock),
        }
    }
}

/// Generation of the lock file present in `chart_root`, if any
///
/// `requirements.lock` takes precedence when both lock files exist.
pub fn lock_generation(chart_root: &Path) -> Result<Option<SchemaGeneration>> {
    for generation in [SchemaGeneration::Legacy, SchemaGeneration::Modern] {
        let path = chart_root.join(generation.lock_filename());
        if path
            .try_exists()
            .map_err(|e| SyncError::io("check", &path, e))?
        {
            return Ok(Some(generation));
        }
    }
    Ok(None)
}

/// Load the lock of the chart in `chart_root`, if it has one
pub fn load_lock(chart_root: &Path) -> Result<Option<ChartLock>> {
    match lock_generation(chart_root)? {
        Some(generation) => {
            let lock = ChartLock::load(&chart_root.join(generation.lock_filename()))?;
            Ok(Some(lock))
        }
        None => Ok(None),
    }
}

/// Resolve the dependency layout of the chart in `chart_root`
///
/// Returns `None` when the chart has no dependencies.
pub fn resolve_schema(chart_root: &Path) -> Result<Option<ChartSchema>> {
    let schema = match lock_generation(chart_root)? {
        Some(generation) => {
            let declarations = chart_root.join(generation.declarations_filename());
            let lock_path = chart_root.join(generation.lock_filename());
            let lock = ChartLock::load(&lock_path)?;
            match generation {
                SchemaGeneration::Legacy => ChartSchema::Legacy {
                    requirements: declarations,
                    lock_path,
                    lock,
                },
                SchemaGeneration::Modern => ChartSchema::Modern {
                    chart_file: declarations,
                    lock_path,
                    lock: Some(lock),
                },
            }
        }
        None => {
            // No lock: only a v2 Chart.yaml can still declare dependencies
            let modern = SchemaGeneration::Modern;
            let chart_file = chart_root.join(modern.declarations_filename());
            let metadata = DependencyDocument::load(&chart_file)?;
            if metadata.api_version().and_then(SchemaGeneration::from_api_version) != Some(modern) {
                return Ok(None);
            }
            ChartSchema::Modern {
                chart_file,
                lock_path: chart_root.join(modern.lock_filename()),
                lock: None,
            }
        }
    };

    tracing::debug!(
        "Chart {} uses the {} schema",
        chart_root.display(),
        schema.generation()
    );
    Ok(Some(schema))
}
