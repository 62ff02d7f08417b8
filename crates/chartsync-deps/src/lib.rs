//! Chart dependency synchronization for chartsync
//!
//! When a chart moves from a source repository to a target repository, its
//! dependencies have to follow. This crate:
//!
//! - detects whether a chart uses `requirements.yaml`/`requirements.lock`
//!   (Legacy) or `Chart.yaml`/`Chart.lock` (Modern)
//! - points dependency repositories at the target, leaving ignored trusted
//!   repositories alone
//! - recomputes the lock digest
//! - rebuilds `charts/` by fetching every dependency archive from where it
//!   now lives, collecting per-dependency failures
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use chartsync_core::Repo;
//! use chartsync_deps::{DependencySync, TrustPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = TrustPolicy::new(
//!     vec![],
//!     vec![Repo::new("https://charts.bitnami.com/bitnami")?],
//! );
//! let sync = DependencySync::from_policy(
//!     Repo::new("https://charts.example.com")?,
//!     Repo::new("oci://registry.example.com/charts")?,
//!     policy,
//! )?;
//!
//! let summary = sync.build_dependencies(Path::new("./wordpress")).await?;
//! println!("{} dependencies rebuilt", summary.dependencies.len());
//! # Ok(())
//! # }
//! ```

pub mod digest;
pub mod error;
pub mod inspect;
pub mod materialize;
pub mod rewrite;
pub mod schema;
pub mod sync;
pub mod trust;

pub use digest::hash_dependencies;
pub use error::{DependencyErrors, DependencyFailure, FailureCause, Result, SyncError};
pub use inspect::chart_dependencies;
pub use materialize::{
    DEFAULT_CONCURRENCY, FetchOrigin, Materializer, prepare_charts_dir, unique_dependencies,
};
pub use rewrite::{DeclarationsRewrite, Rewriter, dependency_repo_url};
pub use schema::{ChartSchema, load_lock, lock_generation, resolve_schema};
pub use sync::{DependencySync, SyncSummary};
pub use trust::{
    LocationId, LocationMapper, SourceClients, TrustClassifier, TrustPolicy, UrlLocationMapper,
    source_clients,
};
