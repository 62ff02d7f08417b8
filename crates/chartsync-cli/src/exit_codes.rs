//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Repository error - a repository client could not be created
pub const REPOSITORY_ERROR: i32 = 3;

/// Chart error - unreadable or invalid chart files
pub const CHART_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Partial failure - the chart was rewritten but some dependencies are missing
pub const PARTIAL_FAILURE: i32 = 6;

/// Configuration error (following sysexits.h convention)
pub const CONFIG_ERROR: i32 = 78;
