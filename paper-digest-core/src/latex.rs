//! Minimal LaTeX reading: enough structure to find command invocations and to
//! hand a file's text to the summarizer.

use std::fmt;
use std::fs;
use std::path::Path;

use regex::Regex;

/// A parsed LaTeX file. Stringifies back to its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexDocument {
    source: String,
}

/// One invocation of a command, e.g. `\input{sections/intro}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexCommand {
    pub name: String,
    pub arguments: Vec<String>,
}

impl TexCommand {
    pub fn first_argument(&self) -> Option<&str> {
        self.arguments.first().map(String::as_str)
    }
}

impl TexDocument {
    pub fn parse(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Read a file, replacing invalid UTF-8 rather than failing on it.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self::parse(String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.source.contains(marker)
    }

    /// Every invocation of `\<command>` outside comments, in document order.
    ///
    /// Accepts braced arguments (with an optional leading `[...]`) and the TeX
    /// primitive form `\input file`. Longer command names sharing the prefix
    /// (`\inputencoding`) are not matches.
    pub fn find_all(&self, command: &str) -> Vec<TexCommand> {
        let pattern = format!(
            r"\\{}(?:\s*\[[^\]]*\])?(?:\s*\{{([^{{}}]*)\}}|[ \t]+([^\s{{}}\\%]+))",
            regex::escape(command)
        );
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::error!(error = ?e, command, "Invalid command pattern");
                return Vec::new();
            }
        };

        let uncommented = strip_comments(&self.source);
        re.captures_iter(&uncommented)
            .filter_map(|cap| {
                cap.get(1)
                    .or_else(|| cap.get(2))
                    .map(|m| m.as_str().trim().to_string())
            })
            .filter(|arg| !arg.is_empty())
            .map(|arg| TexCommand {
                name: command.to_string(),
                arguments: vec![arg],
            })
            .collect()
    }
}

impl fmt::Display for TexDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Drop everything from an unescaped `%` to the end of its line.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let mut backslashes = 0usize;
        let mut cut = None;
        for (idx, ch) in line.char_indices() {
            match ch {
                '\\' => backslashes += 1,
                '%' if backslashes % 2 == 0 => {
                    cut = Some(idx);
                    break;
                }
                _ => backslashes = 0,
            }
        }
        match cut {
            Some(idx) => {
                out.push_str(&line[..idx]);
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => out.push_str(line),
        }
    }
    out
}
