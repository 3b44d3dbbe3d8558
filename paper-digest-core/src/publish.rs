//! # publish: Markdown digest → static HTML page
//!
//! The conversion is plain pattern substitution driven by an ordered
//! [`MarkupRule`] table, not a Markdown grammar. Anything outside the handled
//! subset (headings, bold, italic, links, inline and displayed math, paragraph
//! breaks) passes through as-is.
//!
//! Each paper block becomes a collapsible `<details>` element; the whole list
//! is embedded in a fixed page shell rendered with `minijinja`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use minijinja::{context, AutoEscape, Environment};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{OutputConfig, PublishOptions};
use crate::digest::digest_path;

static ARXIV_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"arxiv:\s*(https?://arxiv\.org/[^\s"<>]+)"#).expect("arxiv line pattern is valid")
});

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("paragraph pattern is valid"));

const PAGE_TEMPLATE_NAME: &str = "page.html";
const DIGEST_TEMPLATE_NAME: &str = "digest.html";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ title|e }}</title>
    <link href="{{ font_url }}" rel="stylesheet">
    <link rel="stylesheet" href="{{ stylesheet }}">
    <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
</head>
<body>
    <div>
        <h1>{{ site_heading }}</h1>
        <nav>
            <div class="links-container">
{%- for link in nav %}
                <a href="{{ link.href }}" class="home-link">{{ link.label }}</a>
{%- endfor %}
            </div>
        </nav>
    </div>

{{ body|safe }}

    <footer>
{%- for link in footer %}
        <a href="{{ link.href }}" class="footer-link">{{ link.label }}</a>{% if not loop.last %} |{% endif %}
{%- endfor %}
{%- if copyright %}
        <p class="copyright">{{ copyright }}</p>
{%- endif %}
    </footer>
</body>
</html>
"#;

const DIGEST_TEMPLATE: &str = r#"
    <div class="container">
        <h1>{{ heading }}</h1>
        <h2>{{ tagline }}</h2>
        <p>updated: {{ date_label }}</p>
        <p>{{ note|safe }}</p>
{% for paper in papers %}
        <details>
            <summary>{{ paper.title }}</summary>
            <div class="newsletter">
                {{ paper.body|safe }}
                <p><a href="{{ paper.link|safe }}" target="_blank">ArXiv Link</a></p>
            </div>
        </details>
{% endfor %}
    </div>
"#;

/// One substitution step of the Markdown conversion.
#[derive(Debug, Clone)]
pub struct MarkupRule {
    pub name: &'static str,
    pub pattern: Regex,
    /// `regex` replacement syntax (`${1}` for groups, `$$` for a literal `$`).
    pub replacement: String,
}

impl MarkupRule {
    pub fn new(name: &'static str, pattern: &str, replacement: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })
    }

    pub fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

/// The default rule table, in application order.
pub fn default_markup_rules() -> Vec<MarkupRule> {
    let table: [(&'static str, &str, &str); 7] = [
        (
            "display_math",
            r"(?s)\$\$(.+?)\$\$",
            r#"<div class="math-display">\[${1}\]</div>"#,
        ),
        (
            "inline_math",
            r"\$([^$\n]+?)\$",
            r#"<span class="math-inline">\(${1}\)</span>"#,
        ),
        ("minor_heading", r"(?m)^#{3,6}[ \t]*(.*?)[ \t]*$", "<strong>${1}</strong>"),
        ("major_heading", r"(?m)^#{1,2}[ \t]+(.*?)[ \t]*$", "<h3>${1}</h3>"),
        ("bold", r"\*\*(.+?)\*\*", "<strong>${1}</strong>"),
        ("italic", r"\*([^*\n]+?)\*", "<em>${1}</em>"),
        (
            "link",
            r"\[([^\]]+)\]\(([^)\s]+)\)",
            r#"<a href="${2}">${1}</a>"#,
        ),
    ];

    table
        .into_iter()
        .filter_map(|(name, pattern, replacement)| {
            match MarkupRule::new(name, pattern, replacement) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    error!(error = ?e, rule = name, "Invalid markup rule, dropping it");
                    None
                }
            }
        })
        .collect()
}

/// Apply `rules` in order, then turn blank lines into paragraph breaks.
pub fn convert_markdown(markdown: &str, rules: &[MarkupRule]) -> String {
    let mut html = markdown.trim().to_string();
    for rule in rules {
        html = rule.apply(&html);
    }
    let html = PARAGRAPH_BREAK.replace_all(&html, "</p><p>");
    format!("<p>{html}</p>")
}

/// One paper chunk of the digest, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChunk {
    pub title: String,
    pub body: String,
    pub arxiv_url: Option<String>,
}

/// Split the digest into paper chunks. A leading `# ` line is the document
/// header, returned separately.
pub fn split_digest(markdown: &str) -> (Option<String>, Vec<DigestChunk>) {
    let mut rest = markdown.trim_start();
    let mut header = None;
    if rest.starts_with("# ") {
        let (line, tail) = rest.split_once('\n').unwrap_or((rest, ""));
        header = Some(line.trim_start_matches('#').trim().to_string());
        rest = tail;
    }

    let chunks = rest
        .split("\n---\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty() && *chunk != "---")
        .map(|chunk| {
            let (first, body) = chunk.split_once('\n').unwrap_or((chunk, ""));
            let title = first.trim().trim_matches('#').trim().to_string();
            let arxiv_url = ARXIV_LINE
                .captures(body)
                .and_then(|cap| cap.get(1))
                .map(|m| m.as_str().to_string());
            let body = ARXIV_LINE.replace_all(body, "").trim().to_string();
            DigestChunk {
                title,
                body,
                arxiv_url,
            }
        })
        .collect();
    (header, chunks)
}

/// Render the digest into the page's main container.
///
/// Titles, heading and tagline are HTML-escaped; converted bodies and the
/// model note are inserted as markup.
pub fn render_digest(
    markdown: &str,
    fallback_title: &str,
    options: &PublishOptions,
    date_label: &str,
    rules: &[MarkupRule],
) -> Result<String, minijinja::Error> {
    let (header, chunks) = split_digest(markdown);
    let heading = header.unwrap_or_else(|| fallback_title.to_string());

    let papers: Vec<_> = chunks
        .iter()
        .map(|chunk| {
            debug!(title = %chunk.title, "Rendering digest chunk");
            context! {
                title => &chunk.title,
                body => convert_markdown(&chunk.body, rules),
                link => chunk.arxiv_url.as_deref().unwrap_or_default(),
            }
        })
        .collect();

    let env = templates()?;
    env.get_template(DIGEST_TEMPLATE_NAME)?.render(context! {
        heading => heading,
        tagline => &options.tagline,
        date_label => date_label,
        note => &options.model_note,
        papers => papers,
    })
}

/// Embed `body` in the fixed page shell.
pub fn render_page(
    title: &str,
    body: &str,
    options: &PublishOptions,
) -> Result<String, minijinja::Error> {
    let env = templates()?;
    env.get_template(PAGE_TEMPLATE_NAME)?.render(context! {
        title => title,
        body => body,
        font_url => &options.font_url,
        stylesheet => &options.stylesheet,
        site_heading => &options.site_heading,
        nav => &options.nav,
        footer => &options.footer,
        copyright => &options.copyright,
    })
}

fn templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    // Shell values come from config and hold markup; digest text does not.
    env.set_auto_escape_callback(|name| match name {
        DIGEST_TEMPLATE_NAME => AutoEscape::Html,
        _ => AutoEscape::None,
    });
    env.add_template(PAGE_TEMPLATE_NAME, PAGE_TEMPLATE)?;
    env.add_template(DIGEST_TEMPLATE_NAME, DIGEST_TEMPLATE)?;
    Ok(env)
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("digest {path} could not be read: {source}")]
    MissingDigest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render page: {0}")]
    Template(#[from] minijinja::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `<newsletter_dir>/html/final_newsletter_<date>.html`
pub fn page_path(newsletter_dir: &Path, date: NaiveDate) -> PathBuf {
    newsletter_dir
        .join("html")
        .join(format!("final_newsletter_{}.html", date.format("%Y-%m-%d")))
}

/// Read the Markdown digest for `date`, render it and write the HTML page.
pub fn publish_newsletter(output: &OutputConfig, date: NaiveDate) -> Result<PathBuf, PublishError> {
    let source = digest_path(&output.newsletter_dir, date, "md");
    info!(path = %source.display(), "Publishing newsletter");

    let markdown = fs::read_to_string(&source).map_err(|e| {
        error!(error = ?e, path = %source.display(), "Failed to read digest");
        PublishError::MissingDigest {
            path: source.clone(),
            source: e,
        }
    })?;

    let rules = default_markup_rules();
    let date_label = date.format("%Y-%m-%d").to_string();
    let body = render_digest(&markdown, &output.title, &output.publish, &date_label, &rules)?;
    let page = render_page(&output.title, &body, &output.publish)?;

    let target = page_path(&output.newsletter_dir, date);
    let write = |path: &Path| -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &page)
    };
    write(&target).map_err(|e| {
        error!(error = ?e, path = %target.display(), "Failed to write newsletter page");
        PublishError::Write {
            path: target.clone(),
            source: e,
        }
    })?;

    info!(path = %target.display(), "Newsletter generated successfully");
    Ok(target)
}
