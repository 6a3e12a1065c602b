//! User list parser for vpn-admin
//!
//! Turns the management tool's "list users" output into [`UserRecord`]s.
//! The structured (JSON) form is preferred when the tool offers it; the
//! text form is parsed heuristically because its layout drifts between
//! tool versions:
//! - blank and separator-only lines are skipped
//! - a header row (only ahead of the first data row) switches on the data
//!   section and locates the name column
//! - without a header, any line with two or more tokens is treated as data
//! - banners, notes, tool chatter and "total" footers are never data
//! - a candidate whose username fails validation is dropped silently

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::sanitizer::is_separator_line;
use crate::table::{data_tokens, detect_header, is_noise_line, normalize_word};
use crate::username::is_valid_username;

/// Header words (prefixes) that mark the user table's header row
const USER_COLUMN_WORDS: [&str; 10] = [
    "remote", "public", "creation", "created", "status", "expir", "valid", "ip", "date", "since",
];

/// ISO `YYYY-MM-DD...` or slash `MM/DD/YYYY` at token start
const DATE_PATTERN: &str = r"^(?:\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4})";

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DATE_PATTERN).expect("date pattern is valid"))
}

/// Certificate state as reported by the management tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Revoked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One user as seen in a single listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    pub status: UserStatus,
    /// `None` when the tool does not report it (shown as `N/A`)
    pub created_at: Option<String>,
    pub expires_at: Option<String>,
    /// Originating line (or JSON element), kept for diagnostics
    pub raw_line: String,
}

impl UserRecord {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Parser bound to one tool dialect (its name marks banner/noise lines)
#[derive(Debug, Clone)]
pub struct UserListParser {
    tool_name: String,
}

impl Default for UserListParser {
    fn default() -> Self {
        Self::new("pivpn")
    }
}

impl UserListParser {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
        }
    }

    /// Parse sanitized text output into records, in output order
    pub fn parse(&self, text: &str) -> Vec<UserRecord> {
        let mut records = Vec::new();
        let mut in_data_section = false;
        let mut name_index = 0;

        for raw in text.lines() {
            let line = raw.trim();

            if line.is_empty() || is_separator_line(line) {
                continue;
            }

            // Only a line ahead of every data row can be the header
            let header_allowed = !in_data_section && records.is_empty();
            if let Some(header) = header_allowed
                .then(|| detect_header(line, &USER_COLUMN_WORDS))
                .flatten()
            {
                in_data_section = true;
                name_index = header.name_index;
                continue;
            }

            if is_noise_line(line, &self.tool_name) {
                continue;
            }

            let tokens = data_tokens(line);
            if !in_data_section && tokens.len() < 2 {
                continue;
            }

            if let Some(record) = record_from_tokens(line, &tokens, name_index) {
                records.push(record);
            }
        }

        records
    }

    /// Parse the tool's structured output.
    ///
    /// Returns `None` when the text is not a JSON array (or an object
    /// wrapping one under `users`/`clients`), so the caller can fall back
    /// to [`parse`](Self::parse).
    pub fn parse_structured(&self, text: &str) -> Option<Vec<UserRecord>> {
        let value: Value = serde_json::from_str(text.trim()).ok()?;
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("users").or_else(|| map.remove("clients")) {
                Some(Value::Array(items)) => items,
                _ => return None,
            },
            _ => return None,
        };

        Some(items.iter().filter_map(record_from_json).collect())
    }
}

/// Convenience wrapper using the default dialect
pub fn parse_user_list(text: &str) -> Vec<UserRecord> {
    UserListParser::default().parse(text)
}

fn record_from_tokens(line: &str, tokens: &[&str], name_index: usize) -> Option<UserRecord> {
    let username = *tokens.get(name_index)?;
    if !is_valid_username(username) {
        return None;
    }

    let others = tokens
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != name_index)
        .map(|(_, t)| *t);

    let mut status = UserStatus::Active;
    let mut dates: Vec<String> = Vec::with_capacity(2);
    for token in others {
        if normalize_word(token) == "revoked" {
            status = UserStatus::Revoked;
        }
        if dates.len() < 2 && date_regex().is_match(token) {
            dates.push(token.to_string());
        }
    }

    let mut dates = dates.into_iter();
    Some(UserRecord {
        username: username.to_string(),
        status,
        created_at: dates.next(),
        expires_at: dates.next(),
        raw_line: line.to_string(),
    })
}

fn record_from_json(item: &Value) -> Option<UserRecord> {
    let object = match item {
        Value::String(name) => {
            return is_valid_username(name).then(|| UserRecord {
                username: name.clone(),
                status: UserStatus::Active,
                created_at: None,
                expires_at: None,
                raw_line: item.to_string(),
            });
        }
        Value::Object(object) => object,
        _ => return None,
    };

    let username = text_field(
        object,
        &["username", "name", "user", "Name", "commonName", "common_name"],
    )?;
    if !is_valid_username(&username) {
        return None;
    }

    let revoked = match json_field(object, &["status", "Status", "state"]) {
        Some(Value::String(s)) => s.to_lowercase().contains("revoked"),
        _ => false,
    } || matches!(json_field(object, &["revoked"]), Some(Value::Bool(true)));

    Some(UserRecord {
        username,
        status: if revoked {
            UserStatus::Revoked
        } else {
            UserStatus::Active
        },
        created_at: text_field(
            object,
            &["createdAt", "created", "created_at", "creation", "creationDate"],
        ),
        expires_at: text_field(
            object,
            &["expiresAt", "expires", "expiry", "expiration", "expires_at"],
        ),
        raw_line: item.to_string(),
    })
}

/// First present key wins
fn json_field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match json_field(object, keys)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && s != "N/A").then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
