//! Lock digest computation
//!
//! The digest only has to be stable across chartsync runs: it is compared
//! against digests produced by this same function, never against other
//! tools.

use sha2::{Digest, Sha256};

use chartsync_core::Dependency;

use crate::error::{Result, SyncError};

const DIGEST_PREFIX: &str = "sha256:";

/// Digest over the (declarations, lock entries) pair
///
/// Dependencies are serialized as a JSON pair with fields in a stable order
/// (`name`, `version`, `repository`, then the remaining keys as found in the
/// document) and hashed with SHA-256.
pub fn hash_dependencies(declarations: &[Dependency], locked: &[Dependency]) -> Result<String> {
    let data = serde_json::to_vec(&(declarations, locked)).map_err(|e| SyncError::Digest {
        message: e.to_string(),
    })?;
    Ok(format!("{}{}", DIGEST_PREFIX, hex::encode(Sha256::digest(&data))))
}
