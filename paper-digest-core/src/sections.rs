//! Section resolution and partitioning.
//!
//! A paper's sections are the files its root document pulls in with the
//! include command (one level deep; includes inside included files are not
//! followed). A root document without includes is a single section.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::latex::TexDocument;
use crate::locate::RootDocument;

/// One named section of a paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub path: PathBuf,
    pub document: TexDocument,
}

/// Sections keyed by id, in include order.
///
/// Inserting an id that is already present replaces its content but keeps its
/// original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: Section) {
        match self.sections.iter_mut().find(|s| s.id == section.id) {
            Some(existing) => {
                debug!(id = %section.id, path = %section.path.display(), "Duplicate section id, replacing content");
                *existing = section;
            }
            None => self.sections.push(section),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("no sections to read")]
    NoSections,
}

/// Map every include in `root` to a file under `extract_root`.
///
/// A trailing `.tex` on the argument is dropped and added back; if that file
/// does not exist but the bare argument does, the bare path is used. With no
/// includes the root document itself is the only section.
pub fn resolve_section_paths(
    root: &RootDocument,
    document: &TexDocument,
    extract_root: &Path,
    include_command: &str,
) -> Vec<PathBuf> {
    let includes = document.find_all(include_command);
    if includes.is_empty() {
        info!(
            path = %root.path.display(),
            command = include_command,
            "No includes declared, treating root document as a single section"
        );
        return vec![root.path.clone()];
    }

    let paths: Vec<PathBuf> = includes
        .iter()
        .filter_map(|cmd| cmd.first_argument())
        .map(|arg| {
            let stem = arg.strip_suffix(".tex").unwrap_or(arg);
            let with_ext = extract_root.join(format!("{stem}.tex"));
            let bare = extract_root.join(arg);
            if !with_ext.exists() && bare.is_file() {
                bare
            } else {
                with_ext
            }
        })
        .collect();

    info!(count = paths.len(), "Resolved section includes");
    debug!(?paths, "Resolved section paths");
    paths
}

/// Read each resolved file into a [`SectionMap`] keyed by file stem.
///
/// Unreadable files are logged and left out. Fails with
/// [`PartitionError::NoSections`] when nothing could be read.
pub fn partition_sections(paths: &[PathBuf]) -> Result<SectionMap, PartitionError> {
    if paths.is_empty() {
        warn!("Section path list is empty");
        return Err(PartitionError::NoSections);
    }

    let mut sections = SectionMap::new();
    for path in paths {
        let id = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => {
                warn!(path = %path.display(), "Section path has no file name, skipping");
                continue;
            }
        };
        match TexDocument::read(path) {
            Ok(document) => sections.insert(Section {
                id,
                path: path.clone(),
                document,
            }),
            Err(e) => warn!(error = ?e, path = %path.display(), "Failed to read section file, skipping"),
        }
    }

    if sections.is_empty() {
        warn!("None of the section files could be read");
        return Err(PartitionError::NoSections);
    }
    Ok(sections)
}
