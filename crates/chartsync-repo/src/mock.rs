//! In-memory repository client for testing
//!
//! Serves archives registered up front, can be told to fail for specific
//! charts, and records every fetch for assertions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tempfile::TempDir;

use chartsync_core::{ARCHIVE_EXTENSION, RepoKind};

use crate::backend::ChartsReader;
use crate::error::{RepoError, Result};

type ChartKey = (String, String);

/// In-memory repository client for testing
#[derive(Clone)]
pub struct MockReader {
    url: String,
    kind: RepoKind,
    charts: Arc<RwLock<HashMap<ChartKey, Vec<u8>>>>,
    failures: Arc<RwLock<HashMap<ChartKey, String>>>,
    fetches: Arc<RwLock<Vec<String>>>,
    downloads: Arc<TempDir>,
}

impl MockReader {
    /// Create an empty mock repository
    pub fn new(url: impl Into<String>, kind: RepoKind) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            kind,
            charts: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            fetches: Arc::new(RwLock::new(Vec::new())),
            downloads: Arc::new(TempDir::new()?),
        })
    }

    /// Serve `data` for `name`/`version`
    pub fn with_chart(self, name: &str, version: &str, data: &[u8]) -> Self {
        self.charts
            .write()
            .unwrap()
            .insert((name.to_string(), version.to_string()), data.to_vec());
        self
    }

    /// Fail fetches of `name`/`version` with a network error
    pub fn with_failure(self, name: &str, version: &str, message: &str) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert((name.to_string(), version.to_string()), message.to_string());
        self
    }

    /// `name-version` of every fetch, in call order
    pub fn fetched(&self) -> Vec<String> {
        self.fetches.read().unwrap().clone()
    }
}

#[async_trait]
impl ChartsReader for MockReader {
    fn url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> RepoKind {
        self.kind
    }

    async fn fetch(&self, name: &str, version: &str) -> Result<PathBuf> {
        let key = (name.to_string(), version.to_string());
        self.fetches
            .write()
            .unwrap()
            .push(format!("{}-{}", name, version));

        if let Some(message) = self.failures.read().unwrap().get(&key) {
            return Err(RepoError::NetworkError {
                message: message.clone(),
            });
        }

        let data = self
            .charts
            .read()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| RepoError::ChartNotFound {
                name: name.to_string(),
                version: version.to_string(),
                repo: self.url.clone(),
            })?;

        let dest = self
            .downloads
            .path()
            .join(format!("{}-{}.{}", name, version, ARCHIVE_EXTENSION));
        std::fs::write(&dest, data)?;
        Ok(dest)
    }
}
