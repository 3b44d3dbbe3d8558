//! # summarize: two-pass summarization of a paper's sections
//!
//! Pass one sends every non-excluded section to the model with a
//! section-specific instruction and collects the replies into a
//! [`SummaryMap`]. Pass two joins those summaries and asks for a four-part
//! abstract (objective / method / results / significance), which is parsed into
//! a [`CompressedAbstract`].
//!
//! Section instructions depend only on the section id, so the [`Summarizer`]
//! memoizes them for as long as it lives (one run, across papers).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::SummarizeConfig;
use crate::contract::{GenerationError, GenerationRequest, TextGenerator};
use crate::sections::SectionMap;

const COMPRESS_SYSTEM: &str =
    "You are a helpful assistant that formats scientific article summaries.";

const COMPRESS_INSTRUCTIONS: &str = "Summarize the key points of a scientific article for a technical audience using the following format. \
Ensure you include exactly these headings and nothing else:\n\n\
## Objective:\nProvide a concise statement of the study's goal or main question.\n\n\
## Method:\nDescribe the main methods or procedures used in the study. Be explicit on the tools used.\n\n\
## Results:\nSummarize the key findings of the study.\n\n\
## Significance:\nExplain the importance and implications of the findings.\n\n\
Here is the summary to format:\n\n";

static HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^[ \t]*#{1,6}[ \t]*\**[ \t]*(objectives?|method(?:s|ology)?|results?|significance)\b[^\n:]*:?[ \t]*\**",
    )
    .expect("heading pattern is valid")
});

/// The instruction used for a section when no generated prompt is available,
/// and the meta-prompt used to generate one.
pub fn base_section_prompt(section_id: &str) -> String {
    format!(
        "Create a detailed prompt to concisely summarize the '{section_id}' section of a scientific article. \
Stress that the summary must cover all key points but be concise, using markdown bullet points."
    )
}

/// Per-section summaries in section order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryMap {
    entries: Vec<(String, String)>,
}

impl SummaryMap {
    pub fn insert(&mut self, section_id: impl Into<String>, summary: impl Into<String>) {
        let section_id = section_id.into();
        let summary = summary.into();
        match self.entries.iter_mut().find(|(id, _)| *id == section_id) {
            Some(entry) => entry.1 = summary,
            None => self.entries.push((section_id, summary)),
        }
    }

    pub fn get(&self, section_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == section_id)
            .map(|(_, s)| s.as_str())
    }

    pub fn contains(&self, section_id: &str) -> bool {
        self.get(section_id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All summaries as `- <summary>` lines, in section order.
    pub fn joined(&self) -> String {
        self.entries
            .iter()
            .map(|(_, summary)| format!("- {summary}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The four-part abstract produced by the compression pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedAbstract {
    pub objective: String,
    pub method: String,
    pub results: String,
    pub significance: String,
}

impl CompressedAbstract {
    pub fn is_empty(&self) -> bool {
        self.objective.is_empty()
            && self.method.is_empty()
            && self.results.is_empty()
            && self.significance.is_empty()
    }
}

/// Split a compression reply on its heading markers.
///
/// A heading line is consumed up to its colon, or whole when it has none, so
/// `## Results and Discussion` introduces the results. Each field takes the
/// text between its heading and the next one; the first
/// occurrence of a heading wins. Headings that never appear leave their field
/// empty.
pub fn parse_compressed_abstract(text: &str) -> CompressedAbstract {
    let mut parsed = CompressedAbstract::default();
    let markers: Vec<_> = HEADING.captures_iter(text).collect();

    for (idx, cap) in markers.iter().enumerate() {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let end = markers
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let body = text[whole.end()..end].trim().to_string();

        let field = match name.as_str().to_ascii_lowercase().as_str() {
            "objective" | "objectives" => &mut parsed.objective,
            "method" | "methods" | "methodology" => &mut parsed.method,
            "result" | "results" => &mut parsed.results,
            "significance" => &mut parsed.significance,
            other => {
                warn!(heading = other, "Unrecognized heading in compressed abstract");
                continue;
            }
        };
        if field.is_empty() {
            *field = body;
        }
    }
    parsed
}

/// Drives both summarization passes against one text-generation handle.
pub struct Summarizer<'a, G: TextGenerator + ?Sized> {
    generator: &'a G,
    config: &'a SummarizeConfig,
    prompts: HashMap<String, String>,
}

impl<'a, G: TextGenerator + ?Sized> Summarizer<'a, G> {
    pub fn new(generator: &'a G, config: &'a SummarizeConfig) -> Self {
        Self {
            generator,
            config,
            prompts: HashMap::new(),
        }
    }

    /// Case-insensitive substring match against the exclusion list.
    pub fn is_excluded(&self, section_id: &str) -> bool {
        let id = section_id.to_lowercase();
        self.config
            .exclude_sections
            .iter()
            .any(|rule| id.contains(&rule.to_lowercase()))
    }

    /// Number of memoized section prompts.
    pub fn cached_prompts(&self) -> usize {
        self.prompts.len()
    }

    /// The instruction for summarizing `section_id`, generated at most once.
    pub async fn section_prompt(&mut self, section_id: &str) -> String {
        if let Some(prompt) = self.prompts.get(section_id) {
            return prompt.clone();
        }

        let base = base_section_prompt(section_id);
        let prompt = if self.config.generate_section_prompts {
            let request = GenerationRequest::new(
                base.clone(),
                format!("Generate a prompt for the '{section_id}' section."),
            );
            match self.generator.generate(request).await {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => {
                    warn!(section = section_id, "Empty generated prompt, using base prompt");
                    base
                }
                Err(e) => {
                    warn!(error = %e, section = section_id, "Prompt generation failed, using base prompt");
                    base
                }
            }
        } else {
            base
        };

        debug!(section = section_id, prompt = %prompt, "Section prompt ready");
        self.prompts.insert(section_id.to_string(), prompt.clone());
        prompt
    }

    /// Summarize every non-excluded section. Failed or empty replies leave the
    /// section out; nothing is retried.
    pub async fn summarize_sections(&mut self, sections: &SectionMap) -> SummaryMap {
        let mut summaries = SummaryMap::default();
        for section in sections.iter() {
            if self.is_excluded(&section.id) {
                info!(section = %section.id, "Section excluded from summarization");
                continue;
            }

            let prompt = self.section_prompt(&section.id).await;
            let request = GenerationRequest::new(prompt, section.document.to_string());
            match self.generator.generate(request).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(section = %section.id, chars = text.len(), "Section summarized");
                    summaries.insert(section.id.clone(), text.trim());
                }
                Ok(_) => warn!(section = %section.id, "Empty summary returned, omitting section"),
                Err(e) => error!(error = %e, section = %section.id, "Section summarization failed, omitting section"),
            }
        }
        summaries
    }

    /// Compress all section summaries into a [`CompressedAbstract`].
    pub async fn compress(
        &self,
        summaries: &SummaryMap,
    ) -> Result<CompressedAbstract, GenerationError> {
        let request = GenerationRequest {
            system: COMPRESS_SYSTEM.to_string(),
            user: format!("{COMPRESS_INSTRUCTIONS}{}", summaries.joined()),
            temperature: Some(self.config.compress_temperature),
            max_tokens: Some(self.config.compress_max_tokens),
        };
        let reply = self.generator.generate(request).await?;
        let parsed = parse_compressed_abstract(reply.trim());
        debug!(?parsed, "Parsed compressed abstract");
        Ok(parsed)
    }
}
