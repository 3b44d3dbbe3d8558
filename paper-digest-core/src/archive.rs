//! Expands downloaded `tar.gz` source bundles into per-paper working directories.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::contract::PaperRecord;

/// A source bundle on disk and the directory it expands into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    pub archive_path: PathBuf,
    pub extract_dir: PathBuf,
}

impl ArchiveHandle {
    pub fn new(archive_path: impl Into<PathBuf>) -> Self {
        let archive_path = archive_path.into();
        let extract_dir = strip_archive_suffix(&archive_path);
        Self {
            archive_path,
            extract_dir,
        }
    }

    /// The handle for `record`'s bundle inside `papers_dir`.
    pub fn for_record(papers_dir: &Path, record: &PaperRecord, extension: &str) -> Self {
        Self::new(papers_dir.join(record.source_file_name(extension)))
    }
}

fn strip_archive_suffix(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = [".tar.gz", ".tgz", ".gz"]
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("{name}_src"));
    path.with_file_name(stem)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    Extracted,
    /// The target directory was already there; nothing was read.
    AlreadyPresent,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive {0} does not exist")]
    Missing(PathBuf),
    #[error("{path} is not a valid gzip tar archive: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Expand `handle.archive_path` into `handle.extract_dir`.
///
/// An existing target directory counts as done. Unpacking goes through a
/// temporary sibling directory that is only renamed into place on success, so
/// a corrupt bundle never leaves a target behind.
pub fn extract_archive(handle: &ArchiveHandle) -> Result<ExtractOutcome, ArchiveError> {
    let target = &handle.extract_dir;
    if target.exists() {
        debug!(path = %target.display(), "Extraction target exists, skipping");
        return Ok(ExtractOutcome::AlreadyPresent);
    }

    let archive_path = &handle.archive_path;
    if !archive_path.is_file() {
        error!(path = %archive_path.display(), "Archive not found");
        return Err(ArchiveError::Missing(archive_path.clone()));
    }

    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| ArchiveError::Io {
        path: parent.to_path_buf(),
        source: e,
    })?;

    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)
        .map_err(|e| ArchiveError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;

    let file = File::open(archive_path).map_err(|e| ArchiveError::Io {
        path: archive_path.clone(),
        source: e,
    })?;
    let mut archive = Archive::new(GzDecoder::new(file));
    if let Err(e) = archive.unpack(staging.path()) {
        error!(error = ?e, path = %archive_path.display(), "Skipping archive, not a valid gzip tar");
        return Err(ArchiveError::Corrupt {
            path: archive_path.clone(),
            source: e,
        });
    }

    fs::rename(staging.path(), target).map_err(|e| ArchiveError::Io {
        path: target.clone(),
        source: e,
    })?;

    info!(
        archive = %archive_path.display(),
        path = %target.display(),
        "Extracted source archive"
    );
    Ok(ExtractOutcome::Extracted)
}
