//! OCI Registry client
//!
//! Pull-only access to charts stored in OCI-compliant registries.

use async_trait::async_trait;
use oci_distribution::Reference;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::secrets::RegistryAuth;
use std::path::PathBuf;
use tempfile::TempDir;

use chartsync_core::{ARCHIVE_EXTENSION, Repo, RepoKind};

use crate::backend::ChartsReader;
use crate::error::{RepoError, Result};

/// Media types for Helm charts in OCI
pub mod media_types {
    /// Helm chart config
    pub const HELM_CONFIG: &str = "application/vnd.cncf.helm.config.v1+json";
    /// Helm chart content layer
    pub const HELM_CONTENT: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";
}

/// OCI registry client
pub struct OciRegistry {
    /// Repository configuration
    repo: Repo,
    /// OCI client
    client: Client,
    /// Authentication
    auth: RegistryAuth,
    /// Pulled archives live here until the client is dropped
    downloads: TempDir,
}

impl OciRegistry {
    /// Create a new OCI registry client
    pub fn new(repo: Repo) -> Result<Self> {
        let auth = match &repo.auth {
            Some(auth) => RegistryAuth::Basic(auth.username.clone(), auth.password.clone()),
            None => RegistryAuth::Anonymous,
        };

        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };

        Ok(Self {
            repo,
            client: Client::new(config),
            auth,
            downloads: TempDir::new()?,
        })
    }

    /// Parse an OCI reference string
    ///
    /// Format: oci://registry/repo:tag or registry/repo:tag
    pub fn parse_reference(reference: &str) -> Result<Reference> {
        let clean = strip_scheme(reference);

        Reference::try_from(clean).map_err(|e| RepoError::InvalidOciReference {
            reference: format!("{}: {}", reference, e),
        })
    }

    /// Build an OCI reference from chart name and tag
    ///
    /// oci://ghcr.io/myorg/charts -> ghcr.io/myorg/charts/name:tag
    pub fn build_reference(&self, name: &str, tag: &str) -> Result<Reference> {
        let base = strip_scheme(&self.repo.url).trim_end_matches('/');
        Self::parse_reference(&format!("{}/{}:{}", base, name, tag))
    }

    /// Pull a chart archive from the registry
    pub async fn pull(&self, name: &str, tag: &str) -> Result<Vec<u8>> {
        let reference = self.build_reference(name, tag)?;

        let image_data = self
            .client
            .pull(
                &reference,
                &self.auth,
                vec![media_types::HELM_CONFIG, media_types::HELM_CONTENT],
            )
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    RepoError::ChartNotFound {
                        name: name.to_string(),
                        version: tag.to_string(),
                        repo: self.repo.url.clone(),
                    }
                } else {
                    RepoError::OciError {
                        message: format!("Failed to pull {}: {}", reference, e),
                    }
                }
            })?;

        // Find the chart content layer
        let chart_layer = image_data
            .layers
            .into_iter()
            .find(|l| l.media_type == media_types::HELM_CONTENT)
            .ok_or_else(|| RepoError::OciError {
                message: format!("No chart content layer found in {}", reference),
            })?;

        Ok(chart_layer.data)
    }
}

#[async_trait]
impl ChartsReader for OciRegistry {
    fn url(&self) -> &str {
        &self.repo.url
    }

    fn kind(&self) -> RepoKind {
        RepoKind::Oci
    }

    async fn fetch(&self, name: &str, version: &str) -> Result<PathBuf> {
        let data = self.pull(name, version).await?;

        let dest = self
            .downloads
            .path()
            .join(format!("{}-{}.{}", name, version, ARCHIVE_EXTENSION));
        tokio::fs::write(&dest, data).await?;

        Ok(dest)
    }
}

fn strip_scheme(url: &str) -> &str {
    url.trim_start_matches("oci://")
        .trim_start_matches("https://")
        .trim_start_matches("http://")
}

/// Whether a pull failed because the chart or its tag does not exist
fn is_not_found(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::ImageManifestNotFoundError(_) => true,
        OciDistributionError::RegistryError { envelope, .. } => envelope.errors.iter().any(|e| {
            matches!(
                e.code,
                OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown
            )
        }),
        OciDistributionError::ServerError { code, .. } => *code == 404,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_reference() {
        let registry =
            OciRegistry::new(Repo::new("oci://ghcr.io/myorg/charts/").unwrap()).unwrap();
        let reference = registry.build_reference("nginx", "1.0.0").unwrap();

        assert_eq!(reference.registry(), "ghcr.io");
        assert_eq!(reference.repository(), "myorg/charts/nginx");
        assert_eq!(reference.tag(), Some("1.0.0"));
    }

    #[test]
    fn test_build_reference_from_https_url() {
        let repo = Repo::with_kind("https://harbor.example.com/library", RepoKind::Oci);
        let registry = OciRegistry::new(repo).unwrap();
        let reference = registry.build_reference("etcd", "1.2.3").unwrap();

        assert_eq!(reference.registry(), "harbor.example.com");
        assert_eq!(reference.repository(), "library/etcd");
    }

    #[test]
    fn test_invalid_reference() {
        let err = OciRegistry::parse_reference("oci://ghcr.io/UPPER/Case:1.0").unwrap_err();
        assert!(matches!(err, RepoError::InvalidOciReference { .. }));
    }

    fn registry_error(code: &str) -> OciDistributionError {
        let body = format!(r#"{{"errors":[{{"code":"{}","message":"nope"}}]}}"#, code);
        OciDistributionError::RegistryError {
            envelope: serde_json::from_str(&body).unwrap(),
            url: "https://ghcr.io/v2/myorg/charts/nginx/manifests/1.0.0".to_string(),
        }
    }

    fn server_error(code: u16, message: &str) -> OciDistributionError {
        OciDistributionError::ServerError {
            code,
            url: "https://ghcr.io/v2/myorg/charts/nginx/manifests/1.0.0".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_is_not_found() {
        assert!(is_not_found(&registry_error("MANIFEST_UNKNOWN")));
        assert!(is_not_found(&registry_error("NAME_UNKNOWN")));
        assert!(is_not_found(&server_error(404, "")));
        assert!(is_not_found(
            &OciDistributionError::ImageManifestNotFoundError("nginx:1.0.0".to_string())
        ));
    }

    #[test]
    fn test_is_not_found_ignores_message_text() {
        // A chart named "404-handler" or a proxy page saying "not found"
        // must not hide a real failure.
        assert!(!is_not_found(&server_error(500, "backend 404-handler not found")));
        assert!(!is_not_found(&registry_error("DENIED")));
        assert!(!is_not_found(&OciDistributionError::AuthenticationFailure(
            "token for 404-handler not found".to_string()
        )));
        assert!(!is_not_found(&OciDistributionError::GenericError(Some(
            "not found".to_string()
        ))));
    }
}
