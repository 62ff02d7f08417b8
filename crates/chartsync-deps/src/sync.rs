//! Dependency synchronization of a single chart

use std::path::Path;
use std::sync::Arc;

use chartsync_core::{DependencyDocument, Repo, SchemaGeneration};
use chartsync_repo::{ChartsReader, create_reader};

use crate::digest::hash_dependencies;
use crate::error::{Result, SyncError};
use crate::materialize::{DEFAULT_CONCURRENCY, Materializer, unique_dependencies};
use crate::rewrite::Rewriter;
use crate::schema::resolve_schema;
use crate::trust::{
    LocationMapper, SourceClients, TrustClassifier, TrustPolicy, UrlLocationMapper, source_clients,
};

/// Outcome of a successful synchronization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Schema generation of the chart, `None` when it has no dependencies
    pub generation: Option<SchemaGeneration>,
    /// `name-version` of every dependency placed in `charts/`
    pub dependencies: Vec<String>,
    /// Repository references changed, declarations and lock together
    pub rewritten: usize,
    /// New lock digest, `None` when the chart has no lock
    pub digest: Option<String>,
}

/// Moves the dependencies of unpacked charts from a source repository to a
/// target repository
///
/// For each chart:
/// 1. the schema generation and lock are resolved
/// 2. repository references are rewritten in the declarations, then in the lock
/// 3. the lock digest is recomputed
/// 4. the declarations and the lock are saved, only once all of the above succeeded
/// 5. `charts/` is rebuilt from the dependencies as they were before rewriting
pub struct DependencySync {
    source: Repo,
    target: Repo,
    target_client: Arc<dyn ChartsReader>,
    source_clients: Arc<SourceClients>,
    classifier: Arc<dyn TrustClassifier>,
    mapper: Arc<dyn LocationMapper>,
    concurrency: usize,
}

impl DependencySync {
    /// Synchronize from `source` to `target`, fetching through `target_client`
    ///
    /// No repository is ignored until a classifier is set.
    pub fn new(source: Repo, target: Repo, target_client: Arc<dyn ChartsReader>) -> Self {
        Self {
            source,
            target,
            target_client,
            source_clients: Arc::new(SourceClients::new()),
            classifier: Arc::new(TrustPolicy::default()),
            mapper: Arc::new(UrlLocationMapper),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Build every client from configuration
    ///
    /// The ignored trusted repositories of `policy` get a source client each.
    pub fn from_policy(source: Repo, target: Repo, policy: TrustPolicy) -> Result<Self> {
        let target_client = create_reader(&target)?;
        let clients = source_clients(&policy.ignore_trusted, &UrlLocationMapper)?;
        Ok(Self::new(source, target, target_client)
            .with_source_clients(clients)
            .with_classifier(Arc::new(policy)))
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn TrustClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_location_mapper(mut self, mapper: Arc<dyn LocationMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_source_clients(mut self, clients: SourceClients) -> Self {
        self.source_clients = Arc::new(clients);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn materializer(&self) -> Materializer {
        Materializer::new(
            Arc::clone(&self.target_client),
            Arc::clone(&self.source_clients),
            Arc::clone(&self.classifier),
            Arc::clone(&self.mapper),
        )
        .with_concurrency(self.concurrency)
    }

    /// Rewrite, relock and rebuild the dependencies of the chart in `chart_root`
    ///
    /// Fails with [`SyncError::Dependencies`](crate::SyncError::Dependencies)
    /// when only some archives could be materialized; the chart files are
    /// already rewritten at that point.
    pub async fn build_dependencies(&self, chart_root: &Path) -> Result<SyncSummary> {
        let materializer = self.materializer();

        let Some(schema) = resolve_schema(chart_root)? else {
            tracing::debug!("Chart {} has no dependencies", chart_root.display());
            materializer.materialize(chart_root, &[]).await?;
            return Ok(SyncSummary::default());
        };
        let generation = schema.generation();

        let rewriter = Rewriter::new(
            self.source.clone(),
            &self.target,
            Arc::clone(&self.classifier),
        )?;
        let (declarations_path, lock_path, lock) = schema.into_parts();

        let mut document = DependencyDocument::load(&declarations_path)?;
        let declarations = rewriter.rewrite_declarations(&mut document)?;
        let mut rewritten = declarations.changed;

        // Origins are decided on the references as they were before rewriting
        let (dependencies, relocked) = match lock {
            Some(mut lock) => {
                let locked = lock.dependencies.clone();
                rewritten += rewriter.rewrite_lock(&mut lock);
                lock.digest = hash_dependencies(&declarations.rewritten, &lock.dependencies)?;
                let content = lock.to_yaml(&lock_path)?;
                (locked, Some((lock.digest, content)))
            }
            None => (declarations.original, None),
        };

        // Both files are rendered before either is written
        document.save()?;
        let digest = match relocked {
            Some((digest, content)) => {
                std::fs::write(&lock_path, content)
                    .map_err(|e| SyncError::io("write", &lock_path, e))?;
                Some(digest)
            }
            None => None,
        };

        tracing::info!(
            "Building {} dependencies of {}",
            dependencies.len(),
            chart_root.display()
        );
        materializer.materialize(chart_root, &dependencies).await?;

        Ok(SyncSummary {
            generation: Some(generation),
            dependencies: unique_dependencies(&dependencies)
                .iter()
                .map(|d| d.id())
                .collect(),
            rewritten,
            digest,
        })
    }
}

impl std::fmt::Debug for DependencySync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencySync")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("source_clients", &self.source_clients.len())
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::LocationId;
    use chartsync_core::RepoKind;
    use chartsync_repo::MockReader;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_chart_without_dependencies() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("Chart.yaml"),
            "apiVersion: v1\nname: nginx\nversion: 1.0.0\n",
        )
        .unwrap();

        let target = MockReader::new("https://mirror.example.com", RepoKind::Helm).unwrap();
        let sync = DependencySync::new(
            Repo::new("https://charts.example.com").unwrap(),
            Repo::new("https://mirror.example.com").unwrap(),
            Arc::new(target.clone()),
        );

        let summary = sync.build_dependencies(tmp.path()).await.unwrap();
        assert_eq!(summary, SyncSummary::default());
        assert!(tmp.path().join("charts").is_dir());
        assert!(target.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_target_is_fatal() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("Chart.yaml"),
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n- name: etcd\n  version: 1.2.3\n  repository: https://charts.example.com\n",
        )
        .unwrap();

        let target = MockReader::new("https://", RepoKind::Oci).unwrap();
        let sync = DependencySync::new(
            Repo::new("https://charts.example.com").unwrap(),
            Repo::with_kind("https://", RepoKind::Oci),
            Arc::new(target),
        );

        assert!(matches!(
            sync.build_dependencies(tmp.path()).await.unwrap_err(),
            SyncError::InvalidTargetUrl { .. }
        ));
    }

    #[tokio::test]
    async fn test_digest_failure_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        // serde_json refuses the null key, so the digest cannot be computed
        let chart_yaml = "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n- name: etcd\n  version: 1.2.3\n  repository: https://charts.example.com\n  import-values:\n    ~: data\n";
        let chart_lock = "dependencies:\n- name: etcd\n  version: 1.2.3\n  repository: https://charts.example.com\ndigest: sha256:old\n";
        std::fs::write(tmp.path().join("Chart.yaml"), chart_yaml).unwrap();
        std::fs::write(tmp.path().join("Chart.lock"), chart_lock).unwrap();

        let target = MockReader::new("https://mirror.example.com", RepoKind::Helm)
            .unwrap()
            .with_chart("etcd", "1.2.3", b"etcd");
        let sync = DependencySync::new(
            Repo::new("https://charts.example.com").unwrap(),
            Repo::new("https://mirror.example.com").unwrap(),
            Arc::new(target.clone()),
        );

        let err = sync.build_dependencies(tmp.path()).await.unwrap_err();
        assert!(matches!(err, SyncError::Digest { .. }), "got {err:?}");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("Chart.yaml")).unwrap(),
            chart_yaml
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("Chart.lock")).unwrap(),
            chart_lock
        );
        assert!(target.fetched().is_empty());
    }

    /// Puts every repository at the same location
    struct FixedLocation;

    impl LocationMapper for FixedLocation {
        fn location_id(&self, _repository_url: &str) -> LocationId {
            LocationId(7)
        }
    }

    #[tokio::test]
    async fn test_custom_location_mapper() {
        const BITNAMI: &str = "https://charts.bitnami.com/bitnami";

        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("Chart.yaml"),
            format!(
                "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n- name: redis\n  version: 17.0.0\n  repository: {}\n",
                BITNAMI
            ),
        )
        .unwrap();

        let target = MockReader::new("https://mirror.example.com", RepoKind::Helm).unwrap();
        let bitnami = MockReader::new("https://bitnami.internal", RepoKind::Helm)
            .unwrap()
            .with_chart("redis", "17.0.0", b"redis");
        let mut clients = SourceClients::new();
        clients.insert(LocationId(7), Arc::new(bitnami.clone()) as Arc<dyn ChartsReader>);

        let policy = TrustPolicy::new(vec![], vec![Repo::new(BITNAMI).unwrap()]);
        let sync = DependencySync::new(
            Repo::new("https://charts.example.com").unwrap(),
            Repo::new("https://mirror.example.com").unwrap(),
            Arc::new(target.clone()),
        )
        .with_classifier(Arc::new(policy))
        .with_location_mapper(Arc::new(FixedLocation))
        .with_source_clients(clients);

        let summary = sync.build_dependencies(tmp.path()).await.unwrap();
        assert_eq!(summary.dependencies, vec!["redis-17.0.0"]);
        assert_eq!(summary.rewritten, 0);
        assert_eq!(bitnami.fetched(), vec!["redis-17.0.0"]);
        assert!(target.fetched().is_empty());
        assert_eq!(
            std::fs::read(tmp.path().join("charts/redis-17.0.0.tgz")).unwrap(),
            b"redis"
        );
    }

    #[tokio::test]
    async fn test_duplicate_dependencies_listed_once() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("Chart.yaml"),
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n- name: common\n  version: 2.0.0\n  repository: https://charts.example.com\n  alias: base\n- name: common\n  version: 2.0.0\n  repository: https://charts.example.com\n  alias: helpers\n",
        )
        .unwrap();

        let target = MockReader::new("https://mirror.example.com", RepoKind::Helm)
            .unwrap()
            .with_chart("common", "2.0.0", b"common");
        let sync = DependencySync::new(
            Repo::new("https://charts.example.com").unwrap(),
            Repo::new("https://mirror.example.com").unwrap(),
            Arc::new(target.clone()),
        );

        let summary = sync.build_dependencies(tmp.path()).await.unwrap();
        assert_eq!(summary.dependencies, vec!["common-2.0.0"]);
        assert_eq!(summary.rewritten, 2);
        assert_eq!(target.fetched(), vec!["common-2.0.0"]);
    }

    #[test]
    fn test_from_policy() {
        let policy = TrustPolicy::new(
            vec![],
            vec![Repo::new("https://charts.bitnami.com/bitnami").unwrap()],
        );
        let sync = DependencySync::from_policy(
            Repo::new("https://charts.example.com").unwrap(),
            Repo::new("oci://registry.example.com/charts").unwrap(),
            policy,
        )
        .unwrap()
        .with_concurrency(0);

        assert_eq!(sync.source_clients.len(), 1);
        assert_eq!(sync.concurrency, 1);
        assert_eq!(sync.target_client.kind(), RepoKind::Oci);
    }
}
