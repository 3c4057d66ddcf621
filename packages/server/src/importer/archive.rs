//! Unpacking uploaded bundles into scratch space.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use super::error::ImportError;

/// macOS archive metadata; never holds a manifest.
const MACOS_METADATA_DIR: &str = "__MACOSX";

#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    pub max_file_size: u64,
    pub max_total_size: u64,
}

/// A bundle unpacked into a temporary directory.
///
/// The directory and everything in it is removed when this value is dropped.
#[derive(Debug)]
pub struct ExtractedBundle {
    dir: TempDir,
    manifest: PathBuf,
}

impl ExtractedBundle {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join(&self.manifest)
    }

    /// Directory auxiliary paths in the manifest are relative to.
    pub fn manifest_dir(&self) -> PathBuf {
        match self.manifest.parent() {
            Some(parent) => self.dir.path().join(parent),
            None => self.dir.path().to_path_buf(),
        }
    }
}

/// Extract `data` on the blocking pool.
pub async fn extract(data: Vec<u8>, limits: ExtractLimits) -> Result<ExtractedBundle, ImportError> {
    tokio::task::spawn_blocking(move || extract_blocking(&data, limits))
        .await
        .map_err(|e| ImportError::Io(std::io::Error::other(e)))?
}

/// Unpack every entry and pick the first `.yaml`/`.yml` file, in archive
/// order, as the manifest.
pub fn extract_blocking(data: &[u8], limits: ExtractLimits) -> Result<ExtractedBundle, ImportError> {
    let cursor = std::io::Cursor::new(data);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| ImportError::Archive(e.to_string()))?;

    let dir = tempfile::Builder::new().prefix("podium-import-").tempdir()?;
    let mut manifest: Option<PathBuf> = None;
    let mut total: u64 = 0;

    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| ImportError::Archive(e.to_string()))?;

        if file.is_dir() {
            continue;
        }

        // Skip entries that would land outside the scratch directory.
        let Some(relative) = file.enclosed_name() else {
            debug!(name = file.name(), "Skipping unsafe archive entry");
            continue;
        };
        if relative
            .components()
            .next()
            .is_some_and(|c| c.as_os_str() == MACOS_METADATA_DIR)
        {
            continue;
        }

        let name = relative.to_string_lossy().to_string();
        let mut buf = Vec::new();
        file.take(limits.max_file_size + 1)
            .read_to_end(&mut buf)
            .map_err(|e| ImportError::Archive(format!("Failed to read '{name}': {e}")))?;

        if buf.len() as u64 > limits.max_file_size {
            return Err(ImportError::Archive(format!(
                "File '{name}' exceeds maximum decompressed size of {} bytes",
                limits.max_file_size
            )));
        }
        total += buf.len() as u64;
        if total > limits.max_total_size {
            return Err(ImportError::Archive(format!(
                "Total decompressed content exceeds {} bytes",
                limits.max_total_size
            )));
        }

        let target = dir.path().join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &buf)?;

        if manifest.is_none() && is_manifest_name(&name) {
            manifest = Some(relative);
        }
    }

    let manifest = manifest.ok_or(ImportError::NoManifest)?;
    debug!(manifest = %manifest.display(), "Located bundle manifest");
    Ok(ExtractedBundle { dir, manifest })
}

fn is_manifest_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".yaml") || lower.ends_with(".yml")
}
