//! Unified repository client trait
//!
//! Provides a single interface for all repository kinds (HTTP, OCI, Local)

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use chartsync_core::{ARCHIVE_EXTENSION, Repo, RepoKind};

use crate::error::{RepoError, Result};
use crate::http::HttpRepository;
use crate::oci::OciRegistry;

/// Read access to a chart repository
///
/// One instance represents one backend repository. Implementations must be
/// safe to share between concurrent fetches.
#[async_trait]
pub trait ChartsReader: Send + Sync {
    /// Repository URL
    fn url(&self) -> &str;

    /// Repository kind
    fn kind(&self) -> RepoKind;

    /// Fetch the packaged chart `name` at `version`
    ///
    /// Returns the path of the archive on the local filesystem. The file stays
    /// valid for as long as the client is alive.
    async fn fetch(&self, name: &str, version: &str) -> Result<PathBuf>;
}

/// Create a repository client from its configuration
pub fn create_reader(repo: &Repo) -> Result<Arc<dyn ChartsReader>> {
    match repo.kind()? {
        RepoKind::Helm => Ok(Arc::new(HttpRepository::new(repo.clone())?)),
        RepoKind::Oci => Ok(Arc::new(OciRegistry::new(repo.clone())?)),
        RepoKind::Local => Ok(Arc::new(LocalRepository::new(repo.clone())?)),
    }
}

// ============ Local Repository ============

/// A directory holding `<name>-<version>.tgz` archives
pub struct LocalRepository {
    repo: Repo,
    root: PathBuf,
}

impl LocalRepository {
    /// Open a local repository, the directory must exist
    pub fn new(repo: Repo) -> Result<Self> {
        let root = PathBuf::from(repo.url.trim_start_matches("file://"));

        if !root.is_dir() {
            return Err(RepoError::RepositoryNotFound {
                url: repo.url.clone(),
            });
        }

        Ok(Self { repo, root })
    }

    /// Directory backing this repository
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl ChartsReader for LocalRepository {
    fn url(&self) -> &str {
        &self.repo.url
    }

    fn kind(&self) -> RepoKind {
        RepoKind::Local
    }

    async fn fetch(&self, name: &str, version: &str) -> Result<PathBuf> {
        let path = self
            .root
            .join(format!("{}-{}.{}", name, version, ARCHIVE_EXTENSION));

        if !tokio::fs::try_exists(&path).await? {
            return Err(RepoError::ChartNotFound {
                name: name.to_string(),
                version: version.to_string(),
                repo: self.repo.url.clone(),
            });
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_fetch() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("etcd-1.2.3.tgz"), b"archive").unwrap();

        let repo = Repo::new(tmp.path().to_string_lossy().to_string()).unwrap();
        let reader = create_reader(&repo).unwrap();
        assert_eq!(reader.kind(), RepoKind::Local);

        let path = reader.fetch("etcd", "1.2.3").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"archive");
    }

    #[tokio::test]
    async fn test_local_fetch_missing() {
        let tmp = TempDir::new().unwrap();
        let repo = Repo::new(format!("file://{}", tmp.path().display())).unwrap();
        let reader = LocalRepository::new(repo).unwrap();

        let err = reader.fetch("etcd", "1.2.3").await.unwrap_err();
        assert!(matches!(err, RepoError::ChartNotFound { .. }));
        assert!(err.to_string().contains("etcd-1.2.3"));
    }

    #[test]
    fn test_local_missing_directory() {
        let repo = Repo::with_kind("/definitely/not/here", RepoKind::Local);
        assert!(matches!(
            LocalRepository::new(repo),
            Err(RepoError::RepositoryNotFound { .. })
        ));
    }

    #[test]
    fn test_create_reader_by_kind() {
        let http = create_reader(&Repo::new("https://charts.example.com").unwrap()).unwrap();
        assert_eq!(http.kind(), RepoKind::Helm);

        let oci = create_reader(&Repo::new("oci://ghcr.io/org/charts").unwrap()).unwrap();
        assert_eq!(oci.kind(), RepoKind::Oci);
        assert_eq!(oci.url(), "oci://ghcr.io/org/charts");
    }
}
