//! HTTP repository implementation
//!
//! Supports traditional Helm-style HTTP repositories with index.yaml

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::OnceCell;
use url::Url;

use chartsync_core::{ARCHIVE_EXTENSION, Repo, RepoKind};

use crate::backend::ChartsReader;
use crate::error::{REQUEST_TIMEOUT_SECS, RepoError, Result};
use crate::index::{ChartEntry, RepositoryIndex};

/// HTTP repository client
pub struct HttpRepository {
    /// Repository configuration
    repo: Repo,
    /// HTTP client
    client: reqwest::Client,
    /// Index, loaded on first fetch
    index: OnceCell<RepositoryIndex>,
    /// Downloaded archives live here until the client is dropped
    downloads: TempDir,
}

impl HttpRepository {
    /// Create a new HTTP repository client
    pub fn new(repo: Repo) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            repo,
            client,
            index: OnceCell::new(),
            downloads: TempDir::new()?,
        })
    }

    /// Get the index URL
    pub fn index_url(&self) -> String {
        format!("{}/index.yaml", self.repo.url.trim_end_matches('/'))
    }

    /// Fetch the repository index, once per client
    pub async fn index(&self) -> Result<&RepositoryIndex> {
        self.index
            .get_or_try_init(|| async {
                let url = self.index_url();
                tracing::debug!("Fetching repository index {}", url);
                let data = self.get_bytes(&url).await?;
                RepositoryIndex::from_bytes(&data)
            })
            .await
    }

    /// Resolve a download URL from the index against the repository URL
    pub fn resolve_url(&self, url: &str) -> Result<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }

        let base = Url::parse(&format!("{}/", self.repo.url.trim_end_matches('/')))?;
        Ok(base.join(url)?.to_string())
    }

    /// Download a chart archive
    pub async fn download(&self, entry: &ChartEntry) -> Result<Vec<u8>> {
        let url = entry
            .download_url()
            .ok_or_else(|| RepoError::ChartNotFound {
                name: entry.name.clone(),
                version: entry.version.clone(),
                repo: self.repo.url.clone(),
            })?;
        let full_url = self.resolve_url(url)?;

        let data = self.get_bytes(&full_url).await?;

        // Verify digest if present
        if let Some(expected_digest) = &entry.digest {
            let actual_digest = compute_digest(&data);
            if !digest_matches(expected_digest, &actual_digest) {
                return Err(RepoError::IntegrityCheckFailed {
                    name: entry.name.clone(),
                    expected: expected_digest.clone(),
                    actual: actual_digest,
                });
            }
        }

        Ok(data)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);

        // Credentials never leave the repository origin
        if let Some(auth) = &self.repo.auth
            && same_origin(&self.repo.url, url)
        {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("GET {}", url),
            });
        }

        let bytes = response.bytes().await.map_err(|e| RepoError::NetworkError {
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ChartsReader for HttpRepository {
    fn url(&self) -> &str {
        &self.repo.url
    }

    fn kind(&self) -> RepoKind {
        RepoKind::Helm
    }

    async fn fetch(&self, name: &str, version: &str) -> Result<PathBuf> {
        let index = self.index().await?;
        let entry = index
            .get_version(name, version)
            .ok_or_else(|| RepoError::ChartNotFound {
                name: name.to_string(),
                version: version.to_string(),
                repo: self.repo.url.clone(),
            })?;

        let data = self.download(entry).await?;

        let dest = self
            .downloads
            .path()
            .join(format!("{}-{}.{}", name, version, ARCHIVE_EXTENSION));
        tokio::fs::write(&dest, data).await?;

        Ok(dest)
    }
}

/// Check whether two URLs share scheme, host and port
fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme()
                && a.host_str() == b.host_str()
                && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}

/// Compute SHA256 digest of data
fn compute_digest(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("sha256:{}", hex::encode(result))
}

/// Check if two digests match (supports various formats)
fn digest_matches(expected: &str, actual: &str) -> bool {
    let normalize = |d: &str| {
        d.trim()
            .to_lowercase()
            .replace("sha256:", "")
            .replace("sha256-", "")
    };

    normalize(expected) == normalize(actual)
}
