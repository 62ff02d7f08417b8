//! chartsync Repository Clients
//!
//! This crate provides the clients chartsync fetches packaged charts with:
//!
//! - **HTTP repositories**: Helm-style repos with index.yaml
//! - **OCI registries**: Docker Hub, GHCR, Harbor, ECR, ...
//! - **Local repositories**: a directory of `<name>-<version>.tgz` archives
//!
//! All of them implement [`ChartsReader`], the single capability the
//! synchronization engine relies on: `fetch(name, version)` returns the path
//! of the archive on the local filesystem.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartsync_core::Repo;
//! use chartsync_repo::create_reader;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Repo::new("https://charts.bitnami.com/bitnami")?;
//! let reader = create_reader(&repo)?;
//!
//! let archive = reader.fetch("nginx", "15.0.0").await?;
//! println!("downloaded to {}", archive.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Credentials are only sent to the origin of the repository they belong to
//! - Index digests are verified when the index provides them

pub mod backend;
pub mod error;
pub mod http;
pub mod index;
pub mod mock;
pub mod oci;

pub use backend::{ChartsReader, LocalRepository, create_reader};
pub use error::{RepoError, Result};
pub use http::HttpRepository;
pub use index::{ChartEntry, RepositoryIndex};
pub use mock::MockReader;
pub use oci::OciRegistry;
