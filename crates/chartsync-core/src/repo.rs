//! Chart repository references

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A chart repository: where charts are read from or synced to
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
    /// Repository URL (HTTP(S), OCI or local path)
    pub url: String,

    /// Repository kind (auto-detected from the URL if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RepoKind>,

    /// Basic auth credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<RepoAuth>,
}

impl Repo {
    /// Create a repository, detecting its kind from the URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let kind = RepoKind::detect(&url)?;
        Ok(Self::with_kind(url, kind))
    }

    /// Create a repository with an explicit kind
    pub fn with_kind(url: impl Into<String>, kind: RepoKind) -> Self {
        Self {
            url: url.into(),
            kind: Some(kind),
            auth: None,
        }
    }

    /// Attach basic auth credentials
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(RepoAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Effective kind: configured, or detected from the URL
    pub fn kind(&self) -> Result<RepoKind> {
        match self.kind {
            Some(kind) => Ok(kind),
            None => RepoKind::detect(&self.url),
        }
    }

    /// Check if this is an OCI registry
    pub fn is_oci(&self) -> bool {
        matches!(self.kind(), Ok(RepoKind::Oci))
    }

    /// Whether `url` designates this repository
    pub fn matches_url(&self, url: &str) -> bool {
        normalize_url(&self.url) == normalize_url(url)
    }
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo")
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("auth", &self.auth.as_ref().map(|a| &a.username))
            .finish()
    }
}

/// Basic auth credentials for a repository
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RepoAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Repository kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    /// Traditional HTTP repository with index.yaml
    #[default]
    #[serde(alias = "HELM", alias = "CHARTMUSEUM", alias = "chartmuseum")]
    Helm,

    /// OCI-compliant registry
    #[serde(alias = "OCI")]
    Oci,

    /// Local directory of packaged charts
    #[serde(alias = "LOCAL")]
    Local,
}

impl RepoKind {
    /// Auto-detect repository kind from URL
    pub fn detect(url: &str) -> Result<Self> {
        if url.starts_with("oci://") {
            Ok(RepoKind::Oci)
        } else if url.starts_with("file://") || url.starts_with('/') {
            Ok(RepoKind::Local)
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Ok(RepoKind::Helm)
        } else {
            Err(CoreError::InvalidRepositoryUrl {
                url: url.to_string(),
                reason: "URL must start with http://, https://, oci://, file://, or /".to_string(),
            })
        }
    }
}

impl std::fmt::Display for RepoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Helm => write!(f, "helm"),
            Self::Oci => write!(f, "oci"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Canonical form of a repository URL used for comparisons
pub fn normalize_url(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}
