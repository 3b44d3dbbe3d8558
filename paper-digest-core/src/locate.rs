use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ExtractionRules;
use crate::latex::TexDocument;

/// The compilable entry point of one paper's source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDocument {
    pub path: PathBuf,
}

/// Walk `extract_root` and return the first file that either carries a
/// conventional root-document name or is a `.tex` file containing the
/// document-start marker.
///
/// Entries are visited sorted by file name so the walk order is stable.
pub fn locate_root_document(extract_root: &Path, rules: &ExtractionRules) -> Option<RootDocument> {
    debug!(path = %extract_root.display(), "Looking for root document");

    for entry in WalkDir::new(extract_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = ?err, "Skipping unreadable entry while locating root document");
                None
            }
        })
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();

        if rules.root_names.iter().any(|name| name == file_name.as_ref()) {
            info!(path = %path.display(), "Root document found by name");
            return Some(RootDocument {
                path: path.to_path_buf(),
            });
        }

        let is_tex = path.extension().is_some_and(|ext| ext == "tex");
        if !is_tex {
            continue;
        }
        match TexDocument::read(path) {
            Ok(doc) if doc.has_marker(&rules.document_start_marker) => {
                info!(path = %path.display(), "Root document found by document-start marker");
                return Some(RootDocument {
                    path: path.to_path_buf(),
                });
            }
            Ok(_) => {}
            Err(e) => warn!(error = ?e, path = %path.display(), "Failed to read tex file"),
        }
    }

    warn!(path = %extract_root.display(), "No root document found");
    None
}
