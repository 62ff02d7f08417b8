//! Synchronization configuration
//!
//! Stored in `~/.config/chartsync/config.yaml` unless `--config` is given:
//!
//! ```yaml
//! source:
//!   repo:
//!     url: https://charts.example.com
//! target:
//!   repo:
//!     url: https://registry.example.com/charts
//!     kind: oci
//! ignoreTrustedRepos:
//!   - url: https://charts.bitnami.com/bitnami
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chartsync_core::Repo;
use chartsync_deps::TrustPolicy;

use crate::error::{CliError, Result};

/// One side of the synchronization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub repo: Repo,
}

/// Configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Repository charts are migrated from
    pub source: Endpoint,

    /// Repository charts are migrated to
    pub target: Endpoint,

    /// Trusted repositories whose charts are synced to the target
    #[serde(default)]
    pub sync_trusted_repos: Vec<Repo>,

    /// Trusted repositories left untouched, dependencies are fetched from them
    #[serde(default)]
    pub ignore_trusted_repos: Vec<Repo>,
}

impl SyncConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return Err(CliError::config_with_help(
                format!("{} not found", path.display()),
                "create it or pass --config <file>",
            ));
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::config(format!("reading {}: {}", path.display(), e)))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| CliError::config(format!("parsing {}: {}", path.display(), e)))?;
        config.validate()?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::config("Could not determine config directory"))?;
        Ok(config_dir.join("chartsync").join("config.yaml"))
    }

    /// Every repository must have a kind, configured or detectable
    fn validate(&self) -> Result<()> {
        let repos = [&self.source.repo, &self.target.repo]
            .into_iter()
            .chain(&self.sync_trusted_repos)
            .chain(&self.ignore_trusted_repos);
        for repo in repos {
            repo.kind().map_err(CliError::from)?;
        }
        Ok(())
    }

    /// Trust classification built from the trusted repository lists
    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy::new(
            self.sync_trusted_repos.clone(),
            self.ignore_trusted_repos.clone(),
        )
    }
}
