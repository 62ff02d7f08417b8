//! chartsync Core - Core types shared by the chartsync crates
//!
//! This crate provides the foundational types used throughout chartsync:
//! - `Dependency`: A declared or locked chart dependency
//! - `DependencyDocument`: `Chart.yaml` / `requirements.yaml` with their dependency list
//! - `ChartLock`: `Chart.lock` / `requirements.lock`
//! - `SchemaGeneration`: Legacy (apiVersion v1) vs Modern (apiVersion v2) charts
//! - `Repo`: A chart repository reference

pub mod archive;
pub mod chart;
pub mod error;
mod patch;
pub mod repo;

pub use archive::extract_archive;
pub use chart::{
    ChartLock, Dependency, DependencyDocument, SchemaGeneration, ARCHIVE_EXTENSION, CHARTS_DIR,
    CHART_FILENAME, CHART_LOCK_FILENAME, REQUIREMENTS_FILENAME, REQUIREMENTS_LOCK_FILENAME,
};
pub use error::{CoreError, Result};
pub use repo::{Repo, RepoAuth, RepoKind, normalize_url};
