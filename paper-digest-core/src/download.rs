//! arXiv client: Atom search feed and e-print source bundles.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::config::FetchConfig;
use crate::contract::{PaperQuery, PaperRecord, PaperSource, SourceError};

/// [`PaperSource`] backed by the public arXiv export API.
pub struct ArxivClient {
    client: Client,
    api_url: String,
    eprint_url: String,
}

impl ArxivClient {
    pub fn new(config: &FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(concat!("paper-digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = ?e, "Failed to build HTTP client with user agent, using defaults");
                Client::new()
            });
        Self {
            client,
            api_url: config.api_url.clone(),
            eprint_url: config.eprint_url.trim_end_matches('/').to_string(),
        }
    }

    fn transport(url: &str, e: reqwest::Error) -> SourceError {
        error!(error = ?e, url = %url, "Request to arXiv failed");
        SourceError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn search(&self, query: &PaperQuery) -> Result<Vec<PaperRecord>, SourceError> {
        let search_query = format!("all:{}", query.query);
        let max_results = query.max_results.to_string();
        info!(
            url = %self.api_url,
            query = %search_query,
            max_results = query.max_results,
            sort_by = query.sort_by.as_query_value(),
            "Searching arXiv"
        );

        let resp = self
            .client
            .get(&self.api_url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", query.sort_by.as_query_value()),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| Self::transport(&self.api_url, e))?;

        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, url = %self.api_url, "arXiv search returned error");
            return Err(SourceError::Http {
                url: self.api_url.clone(),
                status: status.as_u16(),
            });
        }
        let body = resp
            .text()
            .await
            .map_err(|e| Self::transport(&self.api_url, e))?;

        let mut records = parse_atom_feed(&body)?;
        records.truncate(query.max_results);
        info!(count = records.len(), "arXiv search returned records");
        Ok(records)
    }

    async fn download_source(
        &self,
        record: &PaperRecord,
        dir: &Path,
        extension: &str,
    ) -> Result<PathBuf, SourceError> {
        let target = dir.join(record.source_file_name(extension));
        if target.is_file() {
            info!(path = %target.display(), "Source bundle already downloaded, reusing it");
            return Ok(target);
        }

        let url = format!("{}/{}", self.eprint_url, record.arxiv_id());
        info!(url = %url, title = %record.title, "Downloading source bundle");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::transport(&url, e))?;
        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "Source download returned error");
            return Err(SourceError::Http {
                url,
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().await.map_err(|e| Self::transport(&url, e))?;

        let io_err = |e: std::io::Error| {
            error!(error = ?e, path = %target.display(), "Failed to store source bundle");
            SourceError::Io {
                path: target.clone(),
                source: e,
            }
        };
        fs::create_dir_all(dir).map_err(io_err)?;
        fs::write(&target, &bytes).map_err(io_err)?;

        debug!(path = %target.display(), bytes = bytes.len(), "Stored source bundle");
        Ok(target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

#[derive(Default)]
struct PartialEntry {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    pdf_url: Option<String>,
    alternate_url: Option<String>,
}

impl PartialEntry {
    fn take_link(&mut self, e: &BytesStart<'_>) {
        let mut href = None;
        let mut title = None;
        let mut rel = None;
        for attr in e.attributes().flatten() {
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => continue,
            };
            match attr.key.as_ref() {
                b"href" => href = Some(value),
                b"title" => title = Some(value),
                b"rel" => rel = Some(value),
                _ => {}
            }
        }
        let Some(href) = href else { return };
        if title.as_deref() == Some("pdf") {
            self.pdf_url = Some(href);
        } else if rel.as_deref() == Some("alternate") {
            self.alternate_url = Some(href);
        }
    }

    fn append(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Published => &mut self.published,
            Field::AuthorName => match self.authors.last_mut() {
                Some(name) => name,
                None => return,
            },
        };
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
    }

    fn finish(self) -> Option<PaperRecord> {
        let title = collapse_whitespace(&self.title);
        let arxiv_url = match (self.id.trim(), self.alternate_url) {
            ("", Some(alt)) => alt,
            ("", None) => return None,
            (id, _) => id.to_string(),
        };
        if title.is_empty() {
            warn!(url = %arxiv_url, "Skipping feed entry with empty title");
            return None;
        }
        let published = match DateTime::parse_from_rfc3339(self.published.trim()) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                warn!(error = ?e, url = %arxiv_url, "Unparseable publication date, using epoch");
                DateTime::<Utc>::UNIX_EPOCH
            }
        };
        Some(PaperRecord {
            title,
            published,
            summary: collapse_whitespace(&self.summary),
            authors: self.authors,
            pdf_url: self.pdf_url,
            arxiv_url,
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an arXiv Atom feed into records, in feed order.
///
/// Entries without an id or a title are dropped.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<PaperRecord>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<PartialEntry> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"entry" => current = Some(PartialEntry::default()),
                b"author" => in_author = true,
                b"link" => {
                    if let Some(entry) = current.as_mut() {
                        entry.take_link(e);
                    }
                }
                name if current.is_some() => {
                    field = match name {
                        b"id" => Some(Field::Id),
                        b"title" => Some(Field::Title),
                        b"summary" => Some(Field::Summary),
                        b"published" => Some(Field::Published),
                        b"name" if in_author => Some(Field::AuthorName),
                        _ => None,
                    };
                    if field == Some(Field::AuthorName) {
                        if let Some(entry) = current.as_mut() {
                            entry.authors.push(String::new());
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"link" {
                    if let Some(entry) = current.as_mut() {
                        entry.take_link(e);
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = e
                        .unescape()
                        .map_err(|err| SourceError::Feed(err.to_string()))?;
                    entry.append(f, &text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(record) = current.take().and_then(PartialEntry::finish) {
                        debug!(title = %record.title, url = %record.arxiv_url, "Parsed feed entry");
                        records.push(record);
                    }
                    field = None;
                }
                b"author" => in_author = false,
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                error!(error = ?e, "Atom feed parse error");
                return Err(SourceError::Feed(e.to_string()));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}
