//! Output formatter for vpn-admin responses
//!
//! Renders an [`ApiResponse`] in one of two formats:
//! - JSON: the response shape as-is (`success`, `data`, `message`, `errorKind`)
//! - Text: aligned tables and key/value blocks for a terminal

use serde::Serialize;

use crate::clients::ClientListing;
use crate::error::ApiResponse;
use crate::lifecycle::{ArtifactInfo, CreatedUser, RevokedUser};
use crate::status::{RestartOutcome, ServerInfo, ServiceLogs, ServiceStatus};
use crate::user_list::UserRecord;

/// Valid values for `--output-format`
pub const VALID_OUTPUT_FORMATS: [&str; 2] = ["json", "text"];

/// Placeholder for values the tool did not report
const NOT_AVAILABLE: &str = "N/A";

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    #[default]
    Text,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            other => Err(format!(
                "Invalid output format: \"{}\". Valid options are: {}",
                other,
                VALID_OUTPUT_FORMATS.join(", ")
            )),
        }
    }
}

/// Human-readable rendering of a response payload
pub trait TextRender {
    fn render_text(&self) -> String;
}

/// Render a response in the requested format
pub fn format_response<T>(response: &ApiResponse<T>, format: OutputFormat) -> Result<String, String>
where
    T: Serialize + TextRender,
{
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(response)
            .map_err(|e| format!("Failed to serialize to JSON: {}", e)),
        OutputFormat::Text => Ok(format_response_as_text(response)),
    }
}

fn format_response_as_text<T: Serialize + TextRender>(response: &ApiResponse<T>) -> String {
    if !response.success {
        return format!(
            "Error: {}",
            response.message.as_deref().unwrap_or("Operation failed")
        );
    }

    let mut sections = Vec::new();
    if let Some(ref message) = response.message {
        sections.push(message.clone());
    }
    if let Some(ref data) = response.data {
        let body = data.render_text();
        if !body.is_empty() {
            sections.push(body);
        }
    }
    sections.join("\n\n")
}

/// `0 B`, `1.5 KB`, `2 MB`: binary multiples, at most two decimals
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Left-aligned columns separated by two spaces
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let render_row = |cells: Vec<&str>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render_row(headers.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(render_row(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

impl TextRender for Vec<UserRecord> {
    fn render_text(&self) -> String {
        if self.is_empty() {
            return "No users found.".to_string();
        }
        let rows: Vec<Vec<String>> = self
            .iter()
            .map(|u| {
                vec![
                    u.username.clone(),
                    u.status.to_string(),
                    u.created_at.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    u.expires_at.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                ]
            })
            .collect();
        render_table(&["Username", "Status", "Created", "Expires"], &rows)
    }
}

impl TextRender for ClientListing {
    fn render_text(&self) -> String {
        if self.clients.is_empty() {
            return "No connected clients.".to_string();
        }
        let rows: Vec<Vec<String>> = self
            .clients
            .iter()
            .map(|c| {
                vec![
                    c.username.clone(),
                    c.real_address.clone(),
                    c.virtual_address.clone(),
                    format_bytes(c.bytes_in),
                    format_bytes(c.bytes_out),
                    c.connected_since.to_string(),
                ]
            })
            .collect();
        render_table(
            &["Username", "Real Address", "Virtual Address", "Received", "Sent", "Connected Since"],
            &rows,
        )
    }
}

impl TextRender for ServiceStatus {
    fn render_text(&self) -> String {
        let state = if self.active { "active" } else { "inactive" };
        format!(
            "Service:  {}\nStatus:   {}",
            self.service_alias.as_deref().unwrap_or(NOT_AVAILABLE),
            state
        )
    }
}

impl TextRender for ServiceLogs {
    fn render_text(&self) -> String {
        if self.text.trim().is_empty() {
            return "No log entries.".to_string();
        }
        self.text.trim_end().to_string()
    }
}

impl TextRender for ServerInfo {
    fn render_text(&self) -> String {
        [
            format!("Public IP: {}", self.public_ip),
            format!("Local IP:  {}", self.local_ip),
            format!("Hostname:  {}", self.hostname),
            format!("Uptime:    {}", self.uptime),
            format!("OS:        {}", self.os),
        ]
        .join("\n")
    }
}

impl TextRender for RestartOutcome {
    fn render_text(&self) -> String {
        format!(
            "Service:  {}\nVerified: {}",
            self.service_alias,
            if self.verified { "yes" } else { "no" }
        )
    }
}

impl TextRender for CreatedUser {
    fn render_text(&self) -> String {
        format!("Configuration: {}", self.artifact_path.display())
    }
}

impl TextRender for RevokedUser {
    fn render_text(&self) -> String {
        format!(
            "Configuration removed: {}",
            if self.artifact_removed { "yes" } else { "no" }
        )
    }
}

impl TextRender for ArtifactInfo {
    fn render_text(&self) -> String {
        format!(
            "Path: {}\nSize: {}",
            self.path.display(),
            format_bytes(self.size_bytes)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdminError;
    use crate::user_list::UserStatus;

    #[test]
    fn test_parse_output_format() {
        assert_eq!(OutputFormat::parse("JSON"), Ok(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("text"), Ok(OutputFormat::Text));
        assert!(OutputFormat::parse("links-notation")
            .unwrap_err()
            .contains("json, text"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2 MB");
    }

    #[test]
    fn test_user_table() {
        let users = vec![UserRecord {
            username: "alice".to_string(),
            status: UserStatus::Active,
            created_at: Some("2024-01-05".to_string()),
            expires_at: None,
            raw_line: String::new(),
        }];
        let text = users.render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Username  Status  Created     Expires");
        assert_eq!(lines[2], "alice     active  2024-01-05  N/A");
    }

    #[test]
    fn test_text_error_response() {
        let response: ApiResponse<Vec<UserRecord>> =
            ApiResponse::failure(&AdminError::NotFound("User bob not found".to_string()));
        assert_eq!(
            format_response(&response, OutputFormat::Text).unwrap(),
            "Error: User bob not found"
        );
    }

    #[test]
    fn test_json_response() {
        let response = ApiResponse::ok(ServiceStatus {
            active: true,
            service_alias: Some("openvpn@server".to_string()),
        });
        let json = format_response(&response, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["serviceAlias"], "openvpn@server");
        assert!(value.get("errorKind").is_none());
    }
}
