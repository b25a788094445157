//! Response export.
//!
//! Turns a raw model response into file content for a chosen format:
//! fenced-block extraction for code and text, an ordered cleanup pass for
//! markdown, and the whole response otherwise.

pub mod markdown;
pub mod writer;

use regex::Regex;
use std::sync::OnceLock;

pub use writer::write_export;

/// Target format chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Python,
    Bash,
    Markdown,
    Text,
    /// Anything unrecognized; the response is saved unchanged.
    Raw,
}

impl ExportFormat {
    /// Parse a format keyword, case-insensitively.
    pub fn parse(keyword: &str) -> Self {
        match keyword.trim().to_lowercase().as_str() {
            "python" | "py" => ExportFormat::Python,
            "bash" | "sh" => ExportFormat::Bash,
            "markdown" | "md" => ExportFormat::Markdown,
            "text" | "txt" => ExportFormat::Text,
            _ => ExportFormat::Raw,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Python => ".py",
            ExportFormat::Bash => ".sh",
            ExportFormat::Markdown => ".md",
            ExportFormat::Text | ExportFormat::Raw => ".txt",
        }
    }

    /// Human-readable name used in notices.
    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Python => "Python",
            ExportFormat::Bash => "bash",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Text => "text",
            ExportFormat::Raw => "raw",
        }
    }

    fn block_pattern(&self) -> Option<&'static Regex> {
        static PYTHON: OnceLock<Regex> = OnceLock::new();
        static BASH: OnceLock<Regex> = OnceLock::new();
        static TEXT: OnceLock<Regex> = OnceLock::new();

        let (cell, tags) = match self {
            ExportFormat::Python => (&PYTHON, "python|py"),
            ExportFormat::Bash => (&BASH, "bash|sh"),
            ExportFormat::Text => (&TEXT, "text|txt"),
            ExportFormat::Markdown | ExportFormat::Raw => return None,
        };
        Some(cell.get_or_init(|| fenced_block_regex(tags)))
    }
}

fn fenced_block_regex(tags: &str) -> Regex {
    Regex::new(&format!(r"(?s)```(?:{tags})\b(.*?)```")).expect("fenced block pattern is valid")
}

/// Where the exported content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    /// Bodies of this many matching fenced blocks.
    Blocks(usize),
    /// No matching block was found; the full response is used.
    Fallback,
    /// Markdown cleanup was applied to the full response.
    Cleaned,
    /// The full response, unchanged, for an unrecognized format.
    Whole,
}

/// Content and extension for a single export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub content: String,
    pub extension: &'static str,
    pub source: ContentSource,
}

impl ExportResult {
    /// Informational note for the user, if the export degraded or extracted.
    pub fn note(&self, format: ExportFormat) -> Option<String> {
        match self.source {
            ContentSource::Fallback => Some(format!(
                "No {} code blocks found. Saving full response...",
                format.label()
            )),
            ContentSource::Blocks(n) => Some(format!(
                "Extracted {} {} block{}.",
                n,
                format.label(),
                if n == 1 { "" } else { "s" }
            )),
            ContentSource::Cleaned | ContentSource::Whole => None,
        }
    }
}

/// Bodies of all fenced blocks tagged with one of `format`'s aliases.
pub fn extract_blocks(response: &str, format: ExportFormat) -> Vec<String> {
    match format.block_pattern() {
        Some(pattern) => pattern
            .captures_iter(response)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Compute the content and extension to save for `response`.
pub fn export(response: &str, format: ExportFormat) -> ExportResult {
    let extension = format.extension();

    let (content, source) = match format {
        ExportFormat::Python | ExportFormat::Bash | ExportFormat::Text => {
            let blocks = extract_blocks(response, format);
            if blocks.is_empty() {
                (response.to_string(), ContentSource::Fallback)
            } else {
                let count = blocks.len();
                (blocks.join("\n\n"), ContentSource::Blocks(count))
            }
        }
        ExportFormat::Markdown => (markdown::clean(response), ContentSource::Cleaned),
        ExportFormat::Raw => (response.to_string(), ContentSource::Whole),
    };

    ExportResult {
        content,
        extension,
        source,
    }
}
