use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::contract::{PaperQuery, SortOrder};

/// Everything one digest run needs, minus the service credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub fetch: FetchConfig,
    pub extraction: ExtractionRules,
    pub summarize: SummarizeConfig,
    pub output: OutputConfig,
}

impl DigestConfig {
    pub fn trace_loaded(&self) {
        info!(
            query = %self.fetch.query,
            max_results = self.fetch.max_results,
            papers_dir = %self.fetch.papers_dir.display(),
            newsletter_dir = %self.output.newsletter_dir.display(),
            "Loaded DigestConfig"
        );
        debug!(?self, "DigestConfig loaded (full debug)");
    }
}

/// Which papers to retrieve and where their sources go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub query: String,
    pub max_results: usize,
    pub sort_by: SortOrder,
    pub papers_dir: PathBuf,
    /// Extension given to downloaded source bundles.
    pub extension: String,
    pub api_url: String,
    pub eprint_url: String,
}

impl FetchConfig {
    pub fn query(&self) -> PaperQuery {
        PaperQuery {
            query: self.query.clone(),
            max_results: self.max_results,
            sort_by: self.sort_by,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            query: "machine learning".to_string(),
            max_results: 10,
            sort_by: SortOrder::LastUpdatedDate,
            papers_dir: PathBuf::from("./papers"),
            extension: "tar.gz".to_string(),
            api_url: "http://export.arxiv.org/api/query".to_string(),
            eprint_url: "https://arxiv.org/e-print".to_string(),
        }
    }
}

/// Rule tables for finding the root document and its sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRules {
    /// Conventional root-document file names, checked in walk order.
    pub root_names: Vec<String>,
    pub document_start_marker: String,
    /// Command that pulls a sub-document into the root document.
    pub include_command: String,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            root_names: ["main.tex", "ms.tex", "paper.tex", "article.tex", "manuscript.tex"]
                .into_iter()
                .map(String::from)
                .collect(),
            document_start_marker: "\\begin{document}".to_string(),
            include_command: "input".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeConfig {
    /// Sections whose id contains any of these (case-insensitive) are never summarized.
    pub exclude_sections: Vec<String>,
    /// Ask the model to write each section's summarization prompt.
    pub generate_section_prompts: bool,
    pub compress_temperature: f32,
    pub compress_max_tokens: u32,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            exclude_sections: vec!["math_definition".to_string(), "acknowledgements".to_string()],
            generate_section_prompts: true,
            compress_temperature: 0.5,
            compress_max_tokens: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub newsletter_dir: PathBuf,
    pub title: String,
    /// Also write the per-run JSON record file next to the Markdown digest.
    pub write_json: bool,
    pub publish: PublishOptions,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            newsletter_dir: PathBuf::from("./newsletter"),
            title: "Weekly Machine Learning Research Highlights".to_string(),
            write_json: true,
            publish: PublishOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub href: String,
}

impl Link {
    fn new(label: &str, href: &str) -> Self {
        Self {
            label: label.to_string(),
            href: href.to_string(),
        }
    }
}

/// Page shell settings for the published HTML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOptions {
    pub site_heading: String,
    pub tagline: String,
    pub model_note: String,
    pub stylesheet: String,
    pub font_url: String,
    pub nav: Vec<Link>,
    pub footer: Vec<Link>,
    pub copyright: String,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            site_heading: "newsletter".to_string(),
            tagline: "Updates on Friday.".to_string(),
            model_note: "Click titles below to view article summaries. Generated using a custom pipeline with <strong>gpt-4o-mini</strong>.".to_string(),
            stylesheet: "styles.css".to_string(),
            font_url: "https://fonts.googleapis.com/css2?family=Lato:wght@300;400;700&display=swap".to_string(),
            nav: vec![
                Link::new("home", "/"),
                Link::new("about", "/about.html"),
                Link::new("blog", "/blog.html"),
                Link::new("newsletter", "/newsletter.html"),
            ],
            footer: vec![],
            copyright: String::new(),
        }
    }
}
