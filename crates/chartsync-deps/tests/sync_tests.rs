//! End-to-end dependency synchronization of unpacked charts

use std::path::Path;
use std::sync::Arc;

use chartsync_core::{ChartLock, DependencyDocument, Repo, RepoKind, SchemaGeneration};
use chartsync_deps::{
    DependencySync, LocationMapper, SourceClients, SyncError, TrustPolicy, UrlLocationMapper,
    hash_dependencies,
};
use chartsync_repo::{ChartsReader, MockReader};
use tempfile::TempDir;

const SOURCE: &str = "https://charts.example.com";
const TARGET: &str = "https://registry.example.com/charts";
const TARGET_DEP_URL: &str = "oci://registry.example.com/charts";
const BITNAMI: &str = "https://charts.bitnami.com/bitnami";

fn write(root: &Path, name: &str, content: &str) {
    std::fs::write(root.join(name), content).unwrap();
}

fn target_reader() -> MockReader {
    MockReader::new(TARGET, RepoKind::Oci)
        .unwrap()
        .with_chart("common", "2.0.0", b"common")
        .with_chart("etcd", "1.2.3", b"etcd")
        .with_chart("redis", "17.0.0", b"redis")
}

fn engine(target: &MockReader, bitnami: Option<&MockReader>) -> DependencySync {
    let mut clients = SourceClients::new();
    if let Some(bitnami) = bitnami {
        clients.insert(
            UrlLocationMapper.location_id(BITNAMI),
            Arc::new(bitnami.clone()) as Arc<dyn ChartsReader>,
        );
    }
    let policy = TrustPolicy::new(vec![], vec![Repo::new(BITNAMI).unwrap()]);

    DependencySync::new(
        Repo::new(SOURCE).unwrap(),
        Repo::with_kind(TARGET, RepoKind::Oci),
        Arc::new(target.clone()),
    )
    .with_source_clients(clients)
    .with_classifier(Arc::new(policy))
}

fn modern_chart(root: &Path) {
    write(
        root,
        "Chart.yaml",
        &format!(
            r#"apiVersion: v2
name: wordpress
version: 10.0.0
description: Blog
dependencies:
- name: common
  version: 2.0.0
  repository: {SOURCE}
  tags:
  - bitnami-common
- name: redis
  version: 17.0.0
  repository: {BITNAMI}
  condition: redis.enabled
keywords:
- blog
"#
        ),
    );
    write(
        root,
        "Chart.lock",
        &format!(
            r#"dependencies:
- name: common
  version: 2.0.0
  repository: {SOURCE}
- name: redis
  version: 17.0.0
  repository: {BITNAMI}
digest: sha256:0000
generated: "2023-01-01T00:00:00Z"
"#
        ),
    );
}

#[tokio::test]
async fn test_modern_chart_with_lock() {
    let tmp = TempDir::new().unwrap();
    modern_chart(tmp.path());

    let target = target_reader();
    let bitnami = MockReader::new(BITNAMI, RepoKind::Helm)
        .unwrap()
        .with_chart("redis", "17.0.0", b"bitnami-redis");

    let summary = engine(&target, Some(&bitnami))
        .build_dependencies(tmp.path())
        .await
        .unwrap();
    assert_eq!(summary.generation, Some(SchemaGeneration::Modern));
    assert_eq!(summary.dependencies, vec!["common-2.0.0", "redis-17.0.0"]);
    assert_eq!(summary.rewritten, 2);

    // Source dependencies point at the target, ignored ones are kept
    let declared = DependencyDocument::load(&tmp.path().join("Chart.yaml"))
        .unwrap()
        .dependencies()
        .unwrap();
    let lock = ChartLock::load(&tmp.path().join("Chart.lock")).unwrap();
    assert_eq!(declared[0].repository, TARGET_DEP_URL);
    assert_eq!(declared[1].repository, BITNAMI);
    assert_eq!(lock.dependencies[0].repository, TARGET_DEP_URL);
    assert_eq!(lock.dependencies[1].repository, BITNAMI);

    // Digest over the rewritten pair, other lock keys kept
    assert_eq!(
        lock.digest,
        hash_dependencies(&declared, &lock.dependencies).unwrap()
    );
    assert_eq!(summary.digest.as_deref(), Some(lock.digest.as_str()));
    let lock_text = std::fs::read_to_string(tmp.path().join("Chart.lock")).unwrap();
    assert!(lock_text.contains("generated: \"2023-01-01T00:00:00Z\"\n"));

    // Archives come from the target, or from the ignored repository itself
    let charts = tmp.path().join("charts");
    assert_eq!(std::fs::read(charts.join("common-2.0.0.tgz")).unwrap(), b"common");
    assert_eq!(
        std::fs::read(charts.join("redis-17.0.0.tgz")).unwrap(),
        b"bitnami-redis"
    );
    assert_eq!(target.fetched(), vec!["common-2.0.0"]);
    assert_eq!(bitnami.fetched(), vec!["redis-17.0.0"]);
}

#[tokio::test]
async fn test_other_keys_are_preserved() {
    let tmp = TempDir::new().unwrap();
    modern_chart(tmp.path());

    let target = target_reader();
    let bitnami = MockReader::new(BITNAMI, RepoKind::Helm)
        .unwrap()
        .with_chart("redis", "17.0.0", b"redis");
    engine(&target, Some(&bitnami))
        .build_dependencies(tmp.path())
        .await
        .unwrap();

    let chart_yaml = std::fs::read_to_string(tmp.path().join("Chart.yaml")).unwrap();
    let keys: Vec<_> = chart_yaml
        .lines()
        .filter(|l| !l.starts_with(' ') && !l.starts_with('-'))
        .filter_map(|l| l.split(':').next())
        .collect();
    assert_eq!(
        keys,
        vec!["apiVersion", "name", "version", "description", "dependencies", "keywords"]
    );
    assert!(chart_yaml.contains("condition: redis.enabled"));
    assert!(chart_yaml.contains("- bitnami-common"));
}

#[tokio::test]
async fn test_numeric_scalars_survive() {
    let tmp = TempDir::new().unwrap();
    let chart_yaml = format!(
        "apiVersion: v2\nname: app\nversion: 1.0.0\nappVersion: 1.10\ndependencies:\n- name: etcd\n  version: 1.10\n  repository: {SOURCE}\n- name: redis\n  version: 17\n  repository: {SOURCE}\n"
    );
    write(tmp.path(), "Chart.yaml", &chart_yaml);
    write(
        tmp.path(),
        "Chart.lock",
        &format!("dependencies:\n- name: etcd\n  version: 1.10\n  repository: {SOURCE}\n- name: redis\n  version: 17\n  repository: {SOURCE}\ndigest: sha256:0000\n"),
    );

    let target = MockReader::new(TARGET, RepoKind::Oci)
        .unwrap()
        .with_chart("etcd", "1.10", b"etcd")
        .with_chart("redis", "17", b"redis");
    let summary = engine(&target, None)
        .build_dependencies(tmp.path())
        .await
        .unwrap();

    assert_eq!(summary.dependencies, vec!["etcd-1.10", "redis-17"]);
    assert_eq!(target.fetched(), vec!["etcd-1.10", "redis-17"]);
    assert!(tmp.path().join("charts/etcd-1.10.tgz").exists());

    assert_eq!(
        std::fs::read_to_string(tmp.path().join("Chart.yaml")).unwrap(),
        chart_yaml.replace(SOURCE, TARGET_DEP_URL)
    );
    let lock_text = std::fs::read_to_string(tmp.path().join("Chart.lock")).unwrap();
    assert!(lock_text.contains("  version: 1.10\n"));
    assert!(lock_text.contains("  version: 17\n"));
}

#[tokio::test]
async fn test_rewrite_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    modern_chart(tmp.path());

    let target = target_reader();
    let bitnami = MockReader::new(BITNAMI, RepoKind::Helm)
        .unwrap()
        .with_chart("redis", "17.0.0", b"redis");
    let sync = engine(&target, Some(&bitnami));

    let first = sync.build_dependencies(tmp.path()).await.unwrap();
    let chart_yaml = std::fs::read_to_string(tmp.path().join("Chart.yaml")).unwrap();
    let chart_lock = std::fs::read_to_string(tmp.path().join("Chart.lock")).unwrap();

    let second = sync.build_dependencies(tmp.path()).await.unwrap();
    assert_eq!(second.rewritten, 0);
    assert_eq!(first.digest, second.digest);
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("Chart.yaml")).unwrap(),
        chart_yaml
    );
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("Chart.lock")).unwrap(),
        chart_lock
    );
}

#[tokio::test]
async fn test_legacy_chart() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "Chart.yaml", "apiVersion: v1\nname: app\nversion: 1.0.0\n");
    write(
        tmp.path(),
        "requirements.yaml",
        &format!("dependencies:\n- name: etcd\n  version: 1.2.3\n  repository: {SOURCE}/\n"),
    );
    write(
        tmp.path(),
        "requirements.lock",
        &format!("dependencies:\n- name: etcd\n  version: 1.2.3\n  repository: {SOURCE}/\ndigest: sha256:0000\n"),
    );

    let target = target_reader();
    let summary = engine(&target, None)
        .build_dependencies(tmp.path())
        .await
        .unwrap();
    assert_eq!(summary.generation, Some(SchemaGeneration::Legacy));

    let declared = DependencyDocument::load(&tmp.path().join("requirements.yaml"))
        .unwrap()
        .dependencies()
        .unwrap();
    let lock = ChartLock::load(&tmp.path().join("requirements.lock")).unwrap();
    assert_eq!(declared[0].repository, TARGET_DEP_URL);
    assert_eq!(lock.dependencies[0].repository, TARGET_DEP_URL);
    assert!(!tmp.path().join("Chart.lock").exists());
    assert!(tmp.path().join("charts/etcd-1.2.3.tgz").exists());

    // Metadata is left alone for Legacy charts
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("Chart.yaml")).unwrap(),
        "apiVersion: v1\nname: app\nversion: 1.0.0\n"
    );
}

#[tokio::test]
async fn test_partial_failure_keeps_other_dependencies() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "Chart.yaml",
        &format!(
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n- name: common\n  version: 2.0.0\n  repository: {SOURCE}\n- name: etcd\n  version: 1.2.3\n  repository: {SOURCE}\n- name: redis\n  version: 17.0.0\n  repository: {SOURCE}\n"
        ),
    );

    let target = target_reader().with_failure("etcd", "1.2.3", "connection reset");
    let err = engine(&target, None)
        .build_dependencies(tmp.path())
        .await
        .unwrap_err();

    assert!(err.is_partial());
    let SyncError::Dependencies(errors) = &err else {
        panic!("expected dependency errors, got {err:?}");
    };
    assert_eq!(errors.failed_ids(), vec!["etcd-1.2.3"]);
    assert!(err.to_string().contains("etcd-1.2.3"));

    let charts = tmp.path().join("charts");
    assert!(charts.join("common-2.0.0.tgz").exists());
    assert!(charts.join("redis-17.0.0.tgz").exists());
    assert!(!charts.join("etcd-1.2.3.tgz").exists());
}

#[tokio::test]
async fn test_modern_chart_without_lock() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "Chart.yaml",
        &format!(
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n- name: common\n  version: 2.0.0\n  repository: {SOURCE}\n- name: redis\n  version: 17.0.0\n  repository: {BITNAMI}\n"
        ),
    );
    std::fs::create_dir(tmp.path().join("charts")).unwrap();
    write(&tmp.path().join("charts"), "old-0.0.1.tgz", "old");

    let target = target_reader();
    let bitnami = MockReader::new(BITNAMI, RepoKind::Helm)
        .unwrap()
        .with_chart("redis", "17.0.0", b"redis");
    let summary = engine(&target, Some(&bitnami))
        .build_dependencies(tmp.path())
        .await
        .unwrap();

    assert_eq!(summary.generation, Some(SchemaGeneration::Modern));
    assert_eq!(summary.digest, None);
    assert!(!tmp.path().join("Chart.lock").exists());
    assert!(!tmp.path().join("requirements.lock").exists());

    let mut built: Vec<_> = std::fs::read_dir(tmp.path().join("charts"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    built.sort();
    assert_eq!(built, vec!["common-2.0.0.tgz", "redis-17.0.0.tgz"]);
    assert_eq!(bitnami.fetched(), vec!["redis-17.0.0"]);
}

#[tokio::test]
async fn test_chart_without_dependencies() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "Chart.yaml", "apiVersion: v1\nname: nginx\nversion: 1.0.0\n");

    let target = target_reader();
    let summary = engine(&target, None)
        .build_dependencies(tmp.path())
        .await
        .unwrap();

    assert_eq!(summary.generation, None);
    assert!(summary.dependencies.is_empty());
    assert!(tmp.path().join("charts").is_dir());
    assert!(target.fetched().is_empty());
}

#[tokio::test]
async fn test_malformed_lock_is_fatal() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "Chart.yaml",
        &format!("apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n- name: etcd\n  version: 1.2.3\n  repository: {SOURCE}\n"),
    );
    write(tmp.path(), "Chart.lock", "dependencies: [name: etcd\n");

    let target = target_reader();
    let err = engine(&target, None)
        .build_dependencies(tmp.path())
        .await
        .unwrap_err();

    assert!(!err.is_partial());
    assert!(err.to_string().contains("Chart.lock"));
    assert!(target.fetched().is_empty());

    // Nothing was rewritten
    let declared = DependencyDocument::load(&tmp.path().join("Chart.yaml"))
        .unwrap()
        .dependencies()
        .unwrap();
    assert_eq!(declared[0].repository, SOURCE);
}
