//! CLI error types with exit code handling
//!
//! Library errors are flattened into a [`CliError`] carrying the message to
//! display and the exit code to return.

use miette::Diagnostic;
use thiserror::Error;

use chartsync_core::CoreError;
use chartsync_deps::SyncError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Missing or invalid configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartsync::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Unreadable or invalid chart files
    #[error("Chart error: {message}")]
    #[diagnostic(code(chartsync::cli::chart))]
    Chart { message: String },

    /// A repository client could not be set up
    #[error("Repository error: {message}")]
    #[diagnostic(code(chartsync::cli::repository))]
    Repository { message: String },

    /// Some dependencies could not be materialized
    #[error("{message}")]
    #[diagnostic(
        code(chartsync::cli::partial),
        help("the chart files were rewritten; fix the failing dependencies and run the command again")
    )]
    PartialFailure { failed: Vec<String>, message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartsync::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(chartsync::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Chart { .. } => exit_codes::CHART_ERROR,
            CliError::Repository { .. } => exit_codes::REPOSITORY_ERROR,
            CliError::PartialFailure { .. } => exit_codes::PARTIAL_FAILURE,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io { .. } => CliError::Io {
                message: err.to_string(),
            },
            CoreError::InvalidRepositoryUrl { .. } => CliError::config(err.to_string()),
            _ => CliError::Chart {
                message: err.to_string(),
            },
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Core(err) => err.into(),
            SyncError::Io { .. } => CliError::Io {
                message: err.to_string(),
            },
            SyncError::InvalidTargetUrl { .. } => CliError::config(err.to_string()),
            SyncError::Repo(_) => CliError::Repository {
                message: err.to_string(),
            },
            SyncError::Dependencies(errors) => CliError::PartialFailure {
                failed: errors.failed_ids().into_iter().map(String::from).collect(),
                message: errors.to_string(),
            },
            SyncError::Digest { .. } => CliError::internal(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chartsync_deps::{DependencyErrors, FailureCause};

    #[test]
    fn test_partial_failure_exit_code() {
        let mut errors = DependencyErrors::new();
        errors.push(
            "etcd-1.2.3",
            FailureCause::MissingClient {
                url: "https://charts.bitnami.com/bitnami".to_string(),
            },
        );

        let err = CliError::from(SyncError::from(errors));
        assert_eq!(err.exit_code(), exit_codes::PARTIAL_FAILURE);
        let CliError::PartialFailure { failed, message } = err else {
            panic!("expected a partial failure");
        };
        assert_eq!(failed, vec!["etcd-1.2.3"]);
        assert!(message.contains("etcd-1.2.3"));
    }

    #[test]
    fn test_chart_errors() {
        let err = CliError::from(SyncError::Core(CoreError::InvalidDocument {
            path: "Chart.yaml".into(),
            message: "expected a mapping".to_string(),
        }));
        assert_eq!(err.exit_code(), exit_codes::CHART_ERROR);

        let err = CliError::from(SyncError::io(
            "remove",
            std::path::Path::new("charts"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        ));
        assert_eq!(err.exit_code(), exit_codes::IO_ERROR);
    }
}
