//! High-level pipeline: search → download → extract → summarize → digest.
//!
//! [`generate_digest`] runs one scheduled pass. Papers are handled one at a
//! time by [`process_paper`]; any per-paper failure is returned as a
//! [`PaperError`] naming the stage, logged, recorded in the [`DigestReport`],
//! and the run moves on to the next paper. Only a failed search and a failed
//! digest write end the run ([`PipelineError`]).
//!
//! # Callable From
//! - The CLI `generate` and `run` commands
//! - Integration tests, with `MockPaperSource` / `MockTextGenerator`

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::archive::{extract_archive, ArchiveError, ArchiveHandle, ExtractOutcome};
use crate::config::DigestConfig;
use crate::contract::{GenerationError, PaperRecord, PaperSource, SourceError, TextGenerator};
use crate::digest::{DigestDocument, WrittenDigest};
use crate::latex::TexDocument;
use crate::locate::locate_root_document;
use crate::sections::{partition_sections, resolve_section_paths, PartitionError};
use crate::summarize::{CompressedAbstract, Summarizer};

/// A paper that made it through every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperDigest {
    pub record: PaperRecord,
    pub summary: CompressedAbstract,
    /// Sections found in the source tree.
    pub sections: usize,
    /// Sections that produced a summary.
    pub summarized: usize,
}

#[derive(Debug, Error)]
pub enum PaperError {
    #[error("download failed: {0}")]
    Download(#[from] SourceError),
    #[error("archive could not be extracted: {0}")]
    Archive(#[from] ArchiveError),
    #[error("no root document under {0}")]
    NoRootDocument(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    NoSections(#[from] PartitionError),
    #[error("no section produced a summary")]
    NoSummaries,
    #[error("compression failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("compressed abstract is empty")]
    EmptyAbstract,
}

impl PaperError {
    /// Short name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PaperError::Download(_) => "download",
            PaperError::Archive(_) => "archive",
            PaperError::NoRootDocument(_) => "locate",
            PaperError::Read { .. } => "read",
            PaperError::NoSections(_) => "partition",
            PaperError::NoSummaries => "summarize",
            PaperError::Generation(_) | PaperError::EmptyAbstract => "compress",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("paper search failed: {0}")]
    Search(#[source] SourceError),
    #[error("failed to create directory {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write digest: {0}")]
    Write(#[source] std::io::Error),
}

/// A paper left out of the digest, with the stage it stopped at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPaper {
    pub title: String,
    pub stage: &'static str,
    pub reason: String,
}

/// Outcome of one [`generate_digest`] run.
#[derive(Debug)]
pub struct DigestReport {
    pub processed: Vec<PaperDigest>,
    pub skipped: Vec<SkippedPaper>,
    pub written: WrittenDigest,
}

/// Take one paper from its search record to a compressed abstract.
pub async fn process_paper<S, G>(
    record: &PaperRecord,
    config: &DigestConfig,
    source: &S,
    summarizer: &mut Summarizer<'_, G>,
) -> Result<PaperDigest, PaperError>
where
    S: PaperSource + ?Sized,
    G: TextGenerator + ?Sized,
{
    let archive_path = source
        .download_source(record, &config.fetch.papers_dir, &config.fetch.extension)
        .await?;

    let handle = ArchiveHandle::new(archive_path);
    match extract_archive(&handle)? {
        ExtractOutcome::Extracted => {
            info!(path = %handle.extract_dir.display(), "Extracted source bundle")
        }
        ExtractOutcome::AlreadyPresent => {
            debug!(path = %handle.extract_dir.display(), "Using previously extracted sources")
        }
    }

    let root = locate_root_document(&handle.extract_dir, &config.extraction)
        .ok_or_else(|| PaperError::NoRootDocument(handle.extract_dir.clone()))?;
    let document = TexDocument::read(&root.path).map_err(|e| PaperError::Read {
        path: root.path.clone(),
        source: e,
    })?;

    let paths = resolve_section_paths(
        &root,
        &document,
        &handle.extract_dir,
        &config.extraction.include_command,
    );
    let sections = partition_sections(&paths)?;
    info!(title = %record.title, sections = sections.len(), "Partitioned paper into sections");

    let summaries = summarizer.summarize_sections(&sections).await;
    if summaries.is_empty() {
        return Err(PaperError::NoSummaries);
    }

    let summary = summarizer.compress(&summaries).await?;
    if summary.is_empty() {
        return Err(PaperError::EmptyAbstract);
    }

    Ok(PaperDigest {
        record: record.clone(),
        summary,
        sections: sections.len(),
        summarized: summaries.len(),
    })
}

/// Run the whole pipeline once and write the dated digest.
pub async fn generate_digest<S, G>(
    config: &DigestConfig,
    source: &S,
    generator: &G,
    date: NaiveDate,
) -> Result<DigestReport, PipelineError>
where
    S: PaperSource + ?Sized,
    G: TextGenerator + ?Sized,
{
    info!(%date, "Starting digest generation");

    for dir in [&config.fetch.papers_dir, &config.output.newsletter_dir] {
        fs::create_dir_all(dir).map_err(|e| {
            error!(error = ?e, path = %dir.display(), "Failed to create directory");
            PipelineError::Setup {
                path: dir.clone(),
                source: e,
            }
        })?;
    }

    let records = source
        .search(&config.fetch.query())
        .await
        .map_err(PipelineError::Search)?;
    info!(count = records.len(), "Retrieved paper records");

    let mut summarizer = Summarizer::new(generator, &config.summarize);
    let mut document = DigestDocument::new(config.output.title.clone());
    let mut processed = Vec::new();
    let mut skipped = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        info!(index = idx + 1, total = records.len(), title = %record.title, "Processing paper");
        match process_paper(record, config, source, &mut summarizer).await {
            Ok(paper) => {
                info!(
                    title = %record.title,
                    sections = paper.sections,
                    summarized = paper.summarized,
                    "Paper summarized"
                );
                document.push(record, paper.summary.clone());
                processed.push(paper);
            }
            Err(e) => {
                warn!(title = %record.title, stage = e.stage(), error = %e, "Skipping paper");
                skipped.push(SkippedPaper {
                    title: record.title.clone(),
                    stage: e.stage(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let written = document
        .write(&config.output.newsletter_dir, date, config.output.write_json)
        .map_err(PipelineError::Write)?;

    info!(
        processed = processed.len(),
        skipped = skipped.len(),
        cached_prompts = summarizer.cached_prompts(),
        path = %written.markdown.display(),
        "Digest generation finished"
    );
    Ok(DigestReport {
        processed,
        skipped,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_follow_pipeline_order() {
        let errors = [
            PaperError::NoRootDocument(PathBuf::from("x")),
            PaperError::NoSections(PartitionError::NoSections),
            PaperError::NoSummaries,
            PaperError::EmptyAbstract,
        ];
        let stages: Vec<_> = errors.iter().map(PaperError::stage).collect();
        assert_eq!(stages, vec!["locate", "partition", "summarize", "compress"]);
    }
}
