use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{error, info};

use crate::contract::PaperRecord;
use crate::summarize::CompressedAbstract;

/// Marker line between paper blocks in the Markdown digest.
pub const BLOCK_SEPARATOR: &str = "---";

impl CompressedAbstract {
    /// The four fields as `###` sections, in fixed order.
    pub fn to_markdown(&self) -> String {
        [
            ("Objective", &self.objective),
            ("Method", &self.method),
            ("Results", &self.results),
            ("Significance", &self.significance),
        ]
        .iter()
        .map(|(heading, text)| format!("### {heading}\n\n{}", text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

/// One paper's block: title heading, summary, reference URL, separator.
pub fn render_block(title: &str, summary: &str, arxiv_url: &str) -> String {
    format!("## {title}\n\n{summary}\n\narxiv: {arxiv_url}\n\n{BLOCK_SEPARATOR}\n\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestEntry {
    pub title: String,
    #[serde(flatten)]
    pub summary: CompressedAbstract,
    #[serde(rename = "arxiv")]
    pub arxiv_url: String,
}

impl DigestEntry {
    pub fn to_markdown(&self) -> String {
        render_block(&self.title, &self.summary.to_markdown(), &self.arxiv_url)
    }
}

/// The run's digest: a title header and one entry per fully processed paper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestDocument {
    #[serde(rename = "newsletter_title")]
    pub title: String,
    #[serde(rename = "papers")]
    pub entries: Vec<DigestEntry>,
}

/// Paths written by [`DigestDocument::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDigest {
    pub markdown: PathBuf,
    pub json: Option<PathBuf>,
}

/// `<newsletter_dir>/<year>/n_<date>.<extension>`
pub fn digest_path(newsletter_dir: &Path, date: NaiveDate, extension: &str) -> PathBuf {
    newsletter_dir
        .join(date.year().to_string())
        .join(format!("n_{}.{extension}", date.format("%Y-%m-%d")))
}

impl DigestDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, record: &PaperRecord, summary: CompressedAbstract) {
        self.entries.push(DigestEntry {
            title: record.title.clone(),
            summary,
            arxiv_url: record.arxiv_url.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        for entry in &self.entries {
            out.push_str(&entry.to_markdown());
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the Markdown digest (and the JSON record file when asked) for `date`.
    pub fn write(
        &self,
        newsletter_dir: &Path,
        date: NaiveDate,
        write_json: bool,
    ) -> std::io::Result<WrittenDigest> {
        let markdown = digest_path(newsletter_dir, date, "md");
        if let Some(parent) = markdown.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&markdown, self.to_markdown()).map_err(|e| {
            error!(error = ?e, path = %markdown.display(), "Failed to write digest");
            e
        })?;
        info!(path = %markdown.display(), papers = self.entries.len(), "Wrote Markdown digest");

        let json = if write_json {
            let path = digest_path(newsletter_dir, date, "json");
            let body = self
                .to_json()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            fs::write(&path, body)?;
            info!(path = %path.display(), "Wrote JSON digest");
            Some(path)
        } else {
            None
        };

        Ok(WrittenDigest { markdown, json })
    }
}
