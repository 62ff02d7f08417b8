//! Error types for dependency synchronization
//!
//! Two classes of failures:
//! - anything in [`SyncError`] except `Dependencies` aborts the chart
//! - [`DependencyErrors`] collects per-dependency materialization failures;
//!   the other dependencies are still built

use std::path::{Path, PathBuf};
use thiserror::Error;

use chartsync_core::CoreError;
use chartsync_repo::RepoError;

/// Dependency synchronization errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// Chart files could not be read, parsed or written
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to {operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid target repository URL {url}: {reason}")]
    InvalidTargetUrl { url: String, reason: String },

    #[error("Failed to compute dependency digest: {message}")]
    Digest { message: String },

    /// A repository client could not be created
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Some dependencies could not be materialized
    #[error(transparent)]
    Dependencies(#[from] DependencyErrors),
}

impl SyncError {
    /// Wrap an IO error with the operation and the path it was about
    pub fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the chart was only partially materialized
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Dependencies(_))
    }
}

/// Result type for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Why a single dependency could not be materialized
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("no client configured for trusted repository {url}")]
    MissingClient { url: String },

    #[error("fetching chart: {0}")]
    Fetch(#[source] RepoError),

    #[error("copying chart to {}: {source}", dest.display())]
    Copy {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A dependency that could not be materialized
#[derive(Debug)]
pub struct DependencyFailure {
    /// Identity key, `name-version`
    pub id: String,
    /// What went wrong
    pub cause: FailureCause,
}

/// Every dependency that failed during one materialization
#[derive(Debug, Default)]
pub struct DependencyErrors {
    failures: Vec<DependencyFailure>,
}

impl DependencyErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn push(&mut self, id: impl Into<String>, cause: FailureCause) {
        self.failures.push(DependencyFailure {
            id: id.into(),
            cause,
        });
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyFailure> {
        self.failures.iter()
    }

    /// Identity keys of the failed dependencies
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }

    /// `Ok` when nothing failed, the aggregated error otherwise
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for DependencyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} chart {} could not be built:",
            self.failures.len(),
            if self.failures.len() == 1 { "dependency" } else { "dependencies" }
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.id, failure.cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for DependencyErrors {}
