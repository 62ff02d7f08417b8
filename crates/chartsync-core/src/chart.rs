//! Chart dependency declarations and lock files
//!
//! Two generations of charts coexist on disk:
//! - **Legacy** (apiVersion `v1`): dependencies in `requirements.yaml`, locked in `requirements.lock`
//! - **Modern** (apiVersion `v2`): dependencies inside `Chart.yaml`, locked in `Chart.lock`
//!
//! Both generations share the same dependency shape. Documents keep the text
//! they were read from: only the `dependencies` list is typed, and writing
//! back edits the changed values in place so every other byte is untouched.

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::patch;

/// Chart metadata file
pub const CHART_FILENAME: &str = "Chart.yaml";
/// Modern lock file
pub const CHART_LOCK_FILENAME: &str = "Chart.lock";
/// Legacy dependency declarations
pub const REQUIREMENTS_FILENAME: &str = "requirements.yaml";
/// Legacy lock file
pub const REQUIREMENTS_LOCK_FILENAME: &str = "requirements.lock";
/// Folder holding the dependency archives
pub const CHARTS_DIR: &str = "charts";
/// Extension of a packaged chart
pub const ARCHIVE_EXTENSION: &str = "tgz";

const DEPENDENCIES_KEY: &str = "dependencies";
const API_VERSION_KEY: &str = "apiVersion";
const REPOSITORY_KEY: &str = "repository";
const DIGEST_KEY: &str = "digest";

/// Schema generation of a chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    /// apiVersion v1: `requirements.yaml` + `requirements.lock`
    Legacy,
    /// apiVersion v2: `Chart.yaml` + `Chart.lock`
    Modern,
}

impl SchemaGeneration {
    /// File holding the dependency declarations
    pub fn declarations_filename(self) -> &'static str {
        match self {
            Self::Legacy => REQUIREMENTS_FILENAME,
            Self::Modern => CHART_FILENAME,
        }
    }

    /// File holding the lock
    pub fn lock_filename(self) -> &'static str {
        match self {
            Self::Legacy => REQUIREMENTS_LOCK_FILENAME,
            Self::Modern => CHART_LOCK_FILENAME,
        }
    }

    /// `apiVersion` value used by `Chart.yaml` for this generation
    pub fn api_version(self) -> &'static str {
        match self {
            Self::Legacy => "v1",
            Self::Modern => "v2",
        }
    }

    /// Map a `Chart.yaml` apiVersion to its generation
    pub fn from_api_version(api_version: &str) -> Option<Self> {
        match api_version {
            "v1" => Some(Self::Legacy),
            "v2" => Some(Self::Modern),
            _ => None,
        }
    }
}

impl std::fmt::Display for SchemaGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy ({})", self.api_version()),
            Self::Modern => write!(f, "modern ({})", self.api_version()),
        }
    }
}

/// A chart dependency, as declared or as locked
///
/// `name`, `version` and `repository` are the only fields chartsync acts on.
/// They are read as the text written in the file, so `version: 1.10` stays
/// `1.10`. Anything else (`alias`, `condition`, `tags`, `import-values`, ...)
/// is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dependency {
    /// Dependency name
    pub name: String,

    /// Version or version range, treated opaquely
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Repository URL the dependency is fetched from
    pub repository: String,

    /// Remaining keys, in document order
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Dependency {
    /// Create a dependency with no extra keys
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            repository: repository.into(),
            extra: IndexMap::new(),
        }
    }

    /// Identity key, `name-version`
    pub fn id(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// File name of the packaged dependency inside `charts/`
    pub fn archive_name(&self) -> String {
        format!("{}.{}", self.id(), ARCHIVE_EXTENSION)
    }

    /// Whether `self` and `other` differ in nothing but their repository
    fn same_but_repository(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version && self.extra == other.extra
    }
}

impl<'de> Deserialize<'de> for Dependency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(DependencyVisitor)
    }
}

struct DependencyVisitor;

impl<'de> Visitor<'de> for DependencyVisitor {
    type Value = Dependency;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a dependency mapping")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Dependency, A::Error> {
        let mut name = None;
        let mut version = String::new();
        let mut repository = String::new();
        let mut extra = IndexMap::new();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "name" => name = Some(map.next_value::<ScalarText>()?.0),
                "version" => version = map.next_value::<ScalarText>()?.0,
                "repository" => repository = map.next_value::<ScalarText>()?.0,
                _ => {
                    extra.insert(key, map.next_value::<Value>()?);
                }
            }
        }

        Ok(Dependency {
            name: name.ok_or_else(|| <A::Error as de::Error>::missing_field("name"))?,
            version,
            repository,
            extra,
        })
    }
}

/// A scalar taken as written: `1.10`, `2` and `true` all read as text
struct ScalarText(String);

impl<'de> Deserialize<'de> for ScalarText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_str(ScalarTextVisitor)
    }
}

struct ScalarTextVisitor;

impl Visitor<'_> for ScalarTextVisitor {
    type Value = ScalarText;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a scalar")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<ScalarText, E> {
        Ok(ScalarText(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<ScalarText, E> {
        Ok(ScalarText(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<ScalarText, E> {
        Ok(ScalarText(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<ScalarText, E> {
        Ok(ScalarText(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<ScalarText, E> {
        Ok(ScalarText(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<ScalarText, E> {
        Ok(ScalarText(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<ScalarText, E> {
        Ok(ScalarText(String::new()))
    }
}

/// The `dependencies` key of a document, nothing else
#[derive(Deserialize)]
struct DependencyList {
    #[serde(default)]
    dependencies: Option<Vec<Dependency>>,
}

/// Parse `content` as a top-level mapping, an empty document being an empty one
fn parse_mapping(path: &Path, content: &str) -> Result<Mapping> {
    let value: Value = serde_yaml::from_str(content).map_err(|source| CoreError::SchemaParse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Mapping(doc) => Ok(doc),
        Value::Null => Ok(Mapping::new()),
        other => Err(CoreError::InvalidDocument {
            path: path.to_path_buf(),
            message: format!("expected a mapping at the top level, found {:?}", other),
        }),
    }
}

/// Read the `dependencies` list straight from the text, keeping scalars as written
fn parse_dependencies(path: &Path, doc: &Mapping, content: &str) -> Result<Vec<Dependency>> {
    if doc.get(DEPENDENCIES_KEY).is_none_or(Value::is_null) {
        return Ok(Vec::new());
    }
    let list: DependencyList =
        serde_yaml::from_str(content).map_err(|source| CoreError::SchemaParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(list.dependencies.unwrap_or_default())
}

/// Point the `dependencies` entries of `content` at new repositories
///
/// Returns `None` when something other than repositories changed or the
/// text layout cannot be edited in place.
fn patch_repositories(content: &str, before: &[Dependency], after: &[Dependency]) -> Option<String> {
    if before.len() != after.len() {
        return None;
    }

    let mut changes = Vec::with_capacity(after.len());
    for (old, new) in before.iter().zip(after) {
        if !old.same_but_repository(new) {
            return None;
        }
        changes.push((old.repository != new.repository).then_some(new.repository.as_str()));
    }

    patch::set_entry_fields(content, DEPENDENCIES_KEY, REPOSITORY_KEY, &changes)
}

/// A YAML document carrying a `dependencies` list
///
/// Used for both `Chart.yaml` (Modern) and `requirements.yaml` (Legacy).
/// The document keeps the text it was read from, and updating the
/// dependencies only rewrites the values that changed.
#[derive(Debug, Clone)]
pub struct DependencyDocument {
    path: PathBuf,
    content: String,
    doc: Mapping,
}

impl DependencyDocument {
    /// Load a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::io("read", path, e))?;
        Self::parse(path, &content)
    }

    /// Parse a document, `path` is only used for error context and saving
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let doc = parse_mapping(path, content)?;
        Ok(Self {
            path: path.to_path_buf(),
            content: content.to_string(),
            doc,
        })
    }

    /// Path this document was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `apiVersion` field, if any
    pub fn api_version(&self) -> Option<&str> {
        self.doc.get(API_VERSION_KEY).and_then(Value::as_str)
    }

    /// Parse the `dependencies` list
    pub fn dependencies(&self) -> Result<Vec<Dependency>> {
        parse_dependencies(&self.path, &self.doc, &self.content)
    }

    /// Replace the `dependencies` list
    ///
    /// A list that only differs in repositories is edited in place. Other
    /// changes, or layouts that cannot be edited in place, re-serialize the
    /// whole document.
    pub fn set_dependencies(&mut self, deps: &[Dependency]) -> Result<()> {
        let current = self.dependencies()?;
        if current == deps {
            return Ok(());
        }

        let content = match patch_repositories(&self.content, &current, deps) {
            Some(content) => content,
            None => {
                tracing::warn!(
                    "Rewriting {} in full, comments and formatting will not be kept",
                    self.path.display()
                );
                let value = serde_yaml::to_value(deps).map_err(|source| CoreError::Serialize {
                    path: self.path.clone(),
                    source,
                })?;
                let mut doc = self.doc.clone();
                doc.insert(Value::from(DEPENDENCIES_KEY), value);
                serde_yaml::to_string(&doc).map_err(|source| CoreError::Serialize {
                    path: self.path.clone(),
                    source,
                })?
            }
        };

        *self = Self::parse(&self.path, &content)?;
        Ok(())
    }

    /// Render the document as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(self.content.clone())
    }

    /// Overwrite the file this document was loaded from
    pub fn save(&self) -> Result<()> {
        std::fs::write(&self.path, &self.content)
            .map_err(|e| CoreError::io("write", &self.path, e))
    }
}

/// Lock file (`Chart.lock` or `requirements.lock`)
///
/// Like [`DependencyDocument`], a loaded lock is saved by editing the text
/// it was read from, so `generated` and any other key survive as written.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLock {
    /// Locked dependencies
    pub dependencies: Vec<Dependency>,

    /// Digest over the (declarations, lock entries) pair
    pub digest: String,

    /// Text the lock was read from, empty for a new lock
    content: String,

    /// Entries as read, to tell which ones changed
    loaded: Vec<Dependency>,

    /// Digest as read
    loaded_digest: String,
}

#[derive(Deserialize)]
struct LockDigest {
    #[serde(default)]
    digest: Option<ScalarText>,
}

impl ChartLock {
    /// Create a lock that does not exist on disk yet
    pub fn new(dependencies: Vec<Dependency>, digest: impl Into<String>) -> Self {
        Self {
            dependencies,
            digest: digest.into(),
            content: String::new(),
            loaded: Vec::new(),
            loaded_digest: String::new(),
        }
    }

    /// Load a lock file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::io("read", path, e))?;
        Self::parse(path, &content)
    }

    /// Parse a lock file, `path` is only used for error context
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let doc = parse_mapping(path, content)?;
        let dependencies = parse_dependencies(path, &doc, content)?;

        let digest = if doc.get(DIGEST_KEY).is_none_or(Value::is_null) {
            String::new()
        } else {
            let fields: LockDigest =
                serde_yaml::from_str(content).map_err(|source| CoreError::SchemaParse {
                    path: path.to_path_buf(),
                    source,
                })?;
            fields.digest.map(|d| d.0).unwrap_or_default()
        };

        Ok(Self {
            loaded: dependencies.clone(),
            dependencies,
            loaded_digest: digest.clone(),
            digest,
            content: content.to_string(),
        })
    }

    /// Render the lock as YAML, `path` is only used for error context
    pub fn to_yaml(&self, path: &Path) -> Result<String> {
        if !self.content.is_empty() {
            let patched = patch_repositories(&self.content, &self.loaded, &self.dependencies)
                .and_then(|content| {
                    if self.digest == self.loaded_digest {
                        Some(content)
                    } else {
                        patch::set_top_level_scalar(&content, DIGEST_KEY, &self.digest)
                    }
                });
            if let Some(content) = patched {
                return Ok(content);
            }
            tracing::warn!(
                "Rewriting {} in full, comments and formatting will not be kept",
                path.display()
            );
        }

        let mut doc = if self.content.is_empty() {
            Mapping::new()
        } else {
            parse_mapping(path, &self.content)?
        };
        let dependencies =
            serde_yaml::to_value(&self.dependencies).map_err(|source| CoreError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        doc.insert(Value::from(DEPENDENCIES_KEY), dependencies);
        doc.insert(Value::from(DIGEST_KEY), Value::from(self.digest.as_str()));
        serde_yaml::to_string(&doc).map_err(|source| CoreError::Serialize {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save the lock file, fully overwriting `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_yaml(path)?;
        std::fs::write(path, content).map_err(|e| CoreError::io("write", path, e))
    }
}
