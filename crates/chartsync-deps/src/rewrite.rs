//! Repository reference rewriting
//!
//! A dependency is pointed at the target repository when it comes from the
//! source repository, or when its repository is not an ignored trusted one.
//! Ignored repositories keep their URL.

use std::sync::Arc;

use chartsync_core::{ChartLock, Dependency, DependencyDocument, Repo};

use crate::error::{Result, SyncError};
use crate::trust::TrustClassifier;

const OCI_SCHEME: &str = "oci";

/// URL dependencies use to reference `target`
///
/// OCI registries are referenced with the `oci` scheme, whatever scheme the
/// target was configured with. Other repositories are referenced by their
/// URL as configured.
pub fn dependency_repo_url(target: &Repo) -> Result<String> {
    if !target.is_oci() {
        return Ok(target.url.clone());
    }

    let raw = target.url.trim();
    if !raw.contains("://") {
        return Ok(format!("{}://{}", OCI_SCHEME, raw));
    }

    let parsed = url::Url::parse(raw).map_err(|e| SyncError::InvalidTargetUrl {
        url: target.url.clone(),
        reason: e.to_string(),
    })?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(SyncError::InvalidTargetUrl {
            url: target.url.clone(),
            reason: "missing registry host".to_string(),
        });
    }

    // Url refuses to switch a special scheme (https) to a non-special one,
    // so splice the scheme and keep the rest as written
    Ok(format!("{}{}", OCI_SCHEME, &raw[parsed.scheme().len()..]))
}

/// Dependencies of a declarations file before and after rewriting
#[derive(Debug, Clone)]
pub struct DeclarationsRewrite {
    /// Dependencies as found in the file
    pub original: Vec<Dependency>,
    /// Dependencies as written back
    pub rewritten: Vec<Dependency>,
    /// How many repository references changed
    pub changed: usize,
}

/// Rewrites dependency repository references towards the target
pub struct Rewriter {
    source: Repo,
    target_url: String,
    classifier: Arc<dyn TrustClassifier>,
}

impl Rewriter {
    /// Create a rewriter moving dependencies from `source` to `target`
    pub fn new(source: Repo, target: &Repo, classifier: Arc<dyn TrustClassifier>) -> Result<Self> {
        Ok(Self {
            source,
            target_url: dependency_repo_url(target)?,
            classifier,
        })
    }

    /// URL rewritten dependencies point to
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Whether the repository reference of `dep` must be rewritten
    pub fn should_rewrite(&self, dep: &Dependency) -> bool {
        self.source.matches_url(&dep.repository) || !self.classifier.is_ignored(&dep.repository)
    }

    /// Rewrite `deps` in place, returning how many references changed
    pub fn rewrite(&self, deps: &mut [Dependency]) -> usize {
        let mut changed = 0;
        for dep in deps.iter_mut() {
            if !self.should_rewrite(dep) {
                tracing::debug!("Keeping repository {} for {}", dep.repository, dep.id());
                continue;
            }
            if dep.repository != self.target_url {
                tracing::debug!(
                    "Rewriting repository of {}: {} -> {}",
                    dep.id(),
                    dep.repository,
                    self.target_url
                );
                dep.repository = self.target_url.clone();
                changed += 1;
            }
        }
        changed
    }

    /// Rewrite the dependencies of a declarations document
    ///
    /// Only `document` is updated; saving it is up to the caller.
    pub fn rewrite_declarations(
        &self,
        document: &mut DependencyDocument,
    ) -> Result<DeclarationsRewrite> {
        let original = document.dependencies()?;

        let mut rewritten = original.clone();
        let changed = self.rewrite(&mut rewritten);

        document.set_dependencies(&rewritten)?;

        Ok(DeclarationsRewrite {
            original,
            rewritten,
            changed,
        })
    }

    /// Rewrite the entries of a lock, returning how many references changed
    ///
    /// The digest is left alone; it must be recomputed before saving.
    pub fn rewrite_lock(&self, lock: &mut ChartLock) -> usize {
        self.rewrite(&mut lock.dependencies)
    }
}

impl std::fmt::Debug for Rewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rewriter")
            .field("source", &self.source.url)
            .field("target_url", &self.target_url)
            .finish_non_exhaustive()
    }
}
