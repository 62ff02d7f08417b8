//! Trust classification and repository location mapping
//!
//! Both are injected into the engine so that it holds no global state:
//! - a [`TrustClassifier`] tells whether a dependency repository must be left untouched
//! - a [`LocationMapper`] maps a repository URL to the key of its client in a [`SourceClients`] table

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use chartsync_core::{Repo, normalize_url};
use chartsync_repo::{ChartsReader, create_reader};

/// Decides whether a dependency repository is ignored during synchronization
///
/// Ignored repositories keep their URL in the chart and their dependencies
/// are fetched from the repository itself instead of the target.
pub trait TrustClassifier: Send + Sync {
    fn is_ignored(&self, repository_url: &str) -> bool;
}

/// Trust classification from the configured repository lists
#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    /// Trusted repositories whose charts are synced to the target
    pub sync_trusted: Vec<Repo>,
    /// Trusted repositories left untouched
    pub ignore_trusted: Vec<Repo>,
}

impl TrustPolicy {
    pub fn new(sync_trusted: Vec<Repo>, ignore_trusted: Vec<Repo>) -> Self {
        Self {
            sync_trusted,
            ignore_trusted,
        }
    }
}

impl TrustClassifier for TrustPolicy {
    fn is_ignored(&self, repository_url: &str) -> bool {
        // An explicit sync entry wins over an ignore entry
        if self.sync_trusted.iter().any(|r| r.matches_url(repository_url)) {
            return false;
        }
        self.ignore_trusted
            .iter()
            .any(|r| r.matches_url(repository_url))
    }
}

/// Opaque identifier of a repository location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationId(pub u32);

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Maps a repository URL to its location identifier
pub trait LocationMapper: Send + Sync {
    fn location_id(&self, repository_url: &str) -> LocationId;
}

/// Location derived from the repository URL alone
///
/// URLs differing only by a trailing `/` share a location.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlLocationMapper;

impl LocationMapper for UrlLocationMapper {
    fn location_id(&self, repository_url: &str) -> LocationId {
        let hash = Sha256::digest(normalize_url(repository_url).as_bytes());
        LocationId(u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]))
    }
}

/// Source-side clients, keyed by the location of their repository
pub type SourceClients = HashMap<LocationId, Arc<dyn ChartsReader>>;

/// Build the client table for the given (ignored) trusted repositories
pub fn source_clients(
    repos: &[Repo],
    mapper: &dyn LocationMapper,
) -> chartsync_repo::Result<SourceClients> {
    let mut clients = SourceClients::new();
    for repo in repos {
        let id = mapper.location_id(&repo.url);
        tracing::debug!("Registering source client {} for {}", id, repo.url);
        clients.insert(id, create_reader(repo)?);
    }
    Ok(clients)
}
