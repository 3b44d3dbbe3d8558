//! # contract: collaborator interfaces for the digest pipeline
//!
//! The pipeline talks to two external services: a paper repository (search and
//! source-bundle download) and a text-generation model. Both sit behind traits
//! here so the orchestrator can be driven by real clients in the binary and by
//! `mockall` mocks in tests.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; the mocks are exported with the
//!   default `test-export-mocks` feature so the CLI crate's tests can use them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata for one paper, as returned by the repository search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    pub published: DateTime<Utc>,
    /// The repository's own abstract.
    pub summary: String,
    pub authors: Vec<String>,
    pub pdf_url: Option<String>,
    /// Canonical reference URL, e.g. `http://arxiv.org/abs/2401.01234v1`.
    pub arxiv_url: String,
}

impl PaperRecord {
    /// The arXiv identifier (with version) taken from the canonical URL.
    pub fn arxiv_id(&self) -> &str {
        match self.arxiv_url.split_once("/abs/") {
            Some((_, id)) => id.trim_matches('/'),
            None => self.arxiv_url.rsplit('/').next().unwrap_or(&self.arxiv_url),
        }
    }

    /// File name the source bundle is stored under: the title with colons
    /// dropped and spaces/slashes turned into underscores.
    pub fn source_file_name(&self, extension: &str) -> String {
        let stem = self
            .title
            .replace(':', "")
            .replace(' ', "_")
            .replace('/', "_");
        format!("{stem}.{extension}")
    }
}

/// Ordering of search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Relevance,
    #[default]
    LastUpdatedDate,
    SubmittedDate,
}

impl SortOrder {
    /// Value of the `sortBy` query parameter of the arXiv API.
    pub fn as_query_value(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::LastUpdatedDate => "lastUpdatedDate",
            SortOrder::SubmittedDate => "submittedDate",
        }
    }
}

/// A search against the paper repository.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperQuery {
    pub query: String,
    pub max_results: usize,
    pub sort_by: SortOrder,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Http { url: String, status: u16 },
    #[error("failed to parse feed: {0}")]
    Feed(String),
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Paper repository: search for records and fetch their source bundles.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Run a search and return the matching records in result order.
    async fn search(&self, query: &PaperQuery) -> Result<Vec<PaperRecord>, SourceError>;

    /// Download the source bundle of `record` into `dir`, named after
    /// [`PaperRecord::source_file_name`]. Returns the path of the bundle.
    async fn download_source(
        &self,
        record: &PaperRecord,
        dir: &Path,
        extension: &str,
    ) -> Result<PathBuf, SourceError>;
}

/// One call to the text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Instruction sent as the system message.
    pub system: String,
    /// Content sent as the user message.
    pub user: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no API credential configured")]
    MissingCredential,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("response contained no text")]
    EmptyResponse,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Text-generation service: one system instruction plus one user content in,
/// one generated text out.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}
