//! Whitespace-table helpers shared by the text parsers
//!
//! The management tool prints loosely aligned tables framed by banners
//! (`::: Client Status List :::`), notes (`: NOTE : ...`), separator rows
//! and footers. These helpers decide which lines are headers, which are
//! noise, and how a data line splits into tokens.

use crate::sanitizer::is_separator_token;

/// Header words that name the username column
const NAME_WORDS: [&str; 5] = ["name", "user", "username", "client", "common"];

/// Whitespace tokens of a line with separator-only tokens (`::`, `|`) removed
pub fn data_tokens(line: &str) -> Vec<&str> {
    line.split_whitespace()
        .filter(|token| !is_separator_token(token))
        .collect()
}

/// Header line located in a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Position of the username column among the line's data tokens
    pub name_index: usize,
}

/// Recognise a header: a name word plus one of `column_words`, and no
/// token that starts with a digit (data rows carry dates, IPs, counters).
///
/// A row such as `Valid :: client` also matches, so callers only ask
/// before the first data row.
pub fn detect_header(line: &str, column_words: &[&str]) -> Option<Header> {
    let tokens: Vec<String> = data_tokens(line)
        .iter()
        .map(|t| normalize_word(t))
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() || tokens.iter().any(|t| t.starts_with(|c: char| c.is_ascii_digit())) {
        return None;
    }

    let name_index = tokens.iter().position(|t| NAME_WORDS.contains(&t.as_str()))?;
    let has_column = tokens
        .iter()
        .enumerate()
        .any(|(i, t)| i != name_index && column_words.iter().any(|w| t.starts_with(w)));

    has_column.then_some(Header { name_index })
}

/// Banner, note, footer and tool-chatter lines that never carry data
pub fn is_noise_line(line: &str, tool_name: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with(':') {
        return true;
    }

    let lower = trimmed.to_lowercase();
    if !tool_name.is_empty() && lower.contains(&tool_name.to_lowercase()) {
        return true;
    }

    trimmed
        .split_whitespace()
        .any(|token| normalize_word(token) == "total")
}

/// Lowercase and strip surrounding punctuation (`Total:` -> `total`)
pub fn normalize_word(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_lowercase()
}
