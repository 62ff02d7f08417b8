//! Repository index types
//!
//! Subset of the Helm `index.yaml` format needed to locate a chart archive.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{RepoError, Result};

/// Repository index (Helm-compatible)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    /// API version
    #[serde(default)]
    pub api_version: String,

    /// Charts indexed by name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartEntry>>,
}

/// One version of a chart in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartEntry {
    pub name: String,
    pub version: String,

    /// Download URLs, absolute or relative to the repository URL
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 of the archive
    #[serde(default)]
    pub digest: Option<String>,
}

impl ChartEntry {
    /// Primary download URL
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}

impl RepositoryIndex {
    /// Parse index from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RepoError::IndexParseError {
            message: e.to_string(),
        })
    }

    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| RepoError::IndexParseError {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(yaml)
    }

    /// Get a specific version of a chart
    pub fn get_version(&self, name: &str, version: &str) -> Option<&ChartEntry> {
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.version == version)
    }
}
