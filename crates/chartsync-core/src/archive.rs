//! Extraction of packaged charts (`.tgz`)

use flate2::read::GzDecoder;
use std::fs::File;
use std::path::Path;
use tar::Archive;

use crate::error::{CoreError, Result};

/// Extract a `.tgz` chart archive into `dest`
///
/// Charts are packaged with a top-level folder named after the chart, so the
/// chart root ends up at `dest/<chart name>`.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| CoreError::io("open", archive_path, e))?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    std::fs::create_dir_all(dest).map_err(|e| CoreError::io("create", dest, e))?;

    archive.unpack(dest).map_err(|e| CoreError::Archive {
        message: format!("uncompressing {}: {}", archive_path.display(), e),
    })
}
