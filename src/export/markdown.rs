//! Best-effort removal of conversational framing around generated markdown.
//!
//! [`clean`] applies these steps in order:
//! 1. drop prose before the first heading or fence marker,
//! 2. cut trailing boilerplate at the first match of each [`TRAILING_PATTERNS`] entry,
//! 3. trim surrounding whitespace,
//! 4. unwrap a response that is one single fenced block.

use regex::Regex;
use std::sync::OnceLock;

/// Trailing sentences that start conversational boilerplate. Matched
/// case-insensitively; everything from the match to the end is removed.
pub const TRAILING_PATTERNS: &[&str] = &[
    "Would you like me to",
    "Does this look good",
    "Do you want me to",
    "Is there anything else",
    "This README provides",
];

const FENCE: &str = "```";

fn content_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#+ |```").expect("content start pattern is valid"))
}

fn trailing_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        TRAILING_PATTERNS
            .iter()
            .map(|p| {
                Regex::new(&format!("(?is){}.*", regex::escape(p)))
                    .expect("trailing pattern is valid")
            })
            .collect()
    })
}

/// Run every cleanup step in order.
pub fn clean(response: &str) -> String {
    let content = strip_leading_prose(response);
    let content = strip_trailing_boilerplate(content);
    unwrap_single_fence(content.trim()).to_string()
}

/// Drop text before the first line-leading heading or the first fence.
pub fn strip_leading_prose(text: &str) -> &str {
    match content_start().find(text) {
        Some(m) if !text[..m.start()].trim().is_empty() => &text[m.start()..],
        _ => text,
    }
}

/// Cut the text at each trailing boilerplate pattern, in list order.
pub fn strip_trailing_boilerplate(text: &str) -> &str {
    trailing_patterns().iter().fold(text, |acc, re| match re.find(acc) {
        Some(m) => &acc[..m.start()],
        None => acc,
    })
}

/// If `text` is a single fenced block of at least three lines, drop its
/// opening and closing fence lines. Fences nested inside are kept.
pub fn unwrap_single_fence(text: &str) -> &str {
    if !(text.starts_with(FENCE) && text.ends_with(FENCE)) {
        return text;
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let first_ok = lines.first().is_some_and(|l| l.trim().starts_with(FENCE));
    let last_ok = lines.last().is_some_and(|l| l.trim() == FENCE);
    if lines.len() < 3 || !first_ok || !last_ok {
        return text;
    }

    let start = lines[0].len() + 1;
    let end = text.len() - lines[lines.len() - 1].len() - 1;
    &text[start..end]
}
