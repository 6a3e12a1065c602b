//! Service status, journal and host information for vpn-admin
//!
//! Every service operation walks the configured alias list in order and
//! stops at the first alias that answers. Host information is gathered
//! field by field; a field that cannot be read is reported as `Unknown`
//! without affecting the others.

use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use serde::Serialize;

use crate::config::AdminConfig;
use crate::error::{AdminError, AdminResult};
use crate::logging::Logger;
use crate::runner::{shell_quote, CommandOptions, CommandResult, CommandRunner, FailureKind};

/// Placeholder for a host-information field that could not be read
pub const UNKNOWN: &str = "Unknown";
/// Journal lines returned when the caller does not ask for a count
pub const DEFAULT_LOG_LINES: usize = 200;
/// Upper bound on journal lines per request
pub const MAX_LOG_LINES: usize = 5000;

const OS_RELEASE_PATH: &str = "/etc/os-release";
const NO_JOURNAL_ENTRIES: &str = "-- No entries --";

/// Point-in-time service state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub active: bool,
    /// Alias that reported active; `None` when none did
    pub service_alias: Option<String>,
}

/// Journal excerpt for the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLogs {
    /// Alias whose journal was read; `None` when no alias had entries
    pub service_alias: Option<String>,
    /// Line count actually requested after clamping
    pub lines: usize,
    pub text: String,
}

/// Best-effort host description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub public_ip: String,
    pub local_ip: String,
    pub hostname: String,
    pub uptime: String,
    pub os: String,
}

/// Outcome of a successful restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartOutcome {
    pub service_alias: String,
    /// Whether the post-restart `is-active` check ran and passed
    pub verified: bool,
}

/// Queries and controls the VPN service through the service manager
pub struct StatusGateway {
    runner: Arc<dyn CommandRunner>,
    config: AdminConfig,
    logger: Logger,
    os_release: PathBuf,
}

impl StatusGateway {
    pub fn new(runner: Arc<dyn CommandRunner>, config: AdminConfig, logger: &Logger) -> Self {
        Self {
            runner,
            config,
            logger: logger.child("status"),
            os_release: PathBuf::from(OS_RELEASE_PATH),
        }
    }

    /// Read the OS name from another `os-release` file
    pub fn with_os_release(mut self, path: impl Into<PathBuf>) -> Self {
        self.os_release = path.into();
        self
    }

    /// First alias whose `systemctl is-active` says `active` wins
    pub fn get_service_status(&self) -> ServiceStatus {
        for alias in self.aliases() {
            if self.is_active(alias) {
                self.logger.debug(format!("Service {} is active", alias));
                return ServiceStatus {
                    active: true,
                    service_alias: Some(alias.to_string()),
                };
            }
        }

        ServiceStatus {
            active: false,
            service_alias: None,
        }
    }

    /// Last `lines` journal lines (clamped to `1..=5000`) of the first alias with entries.
    ///
    /// A missing privilege stops the walk at once; other failures move on
    /// to the next alias.
    pub fn get_logs(&self, lines: usize) -> AdminResult<ServiceLogs> {
        let lines = lines.clamp(1, MAX_LOG_LINES);
        let mut last_error: Option<AdminError> = None;

        for alias in self.aliases() {
            let command = self.privileged(&format!(
                "journalctl -u {} --no-pager -n {}",
                shell_quote(alias),
                lines
            ));
            let result = self.run(&command)?;

            if result.success {
                if is_empty_journal(&result.stdout) {
                    self.logger.debug(format!("No journal entries for {}", alias));
                    continue;
                }
                return Ok(ServiceLogs {
                    service_alias: Some(alias.to_string()),
                    lines,
                    text: result.stdout,
                });
            }

            let err = AdminError::from_command(&result, "Failed to retrieve logs");
            if result.failure_kind == FailureKind::AuthRequired {
                return Err(err);
            }
            last_error = Some(err);
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(ServiceLogs {
                service_alias: None,
                lines,
                text: String::new(),
            }),
        }
    }

    /// Each field comes from its own command and fails on its own
    pub fn get_server_info(&self) -> ServerInfo {
        let public_ip = self
            .read_field(&format!("curl -s -m 5 {}", shell_quote(&self.config.public_ip_url)))
            .and_then(|out| {
                let candidate = out.lines().next().unwrap_or("").trim().to_string();
                candidate.parse::<IpAddr>().ok().map(|_| candidate)
            });
        let local_ip = self
            .read_field("hostname -I")
            .and_then(|out| out.split_whitespace().next().map(str::to_string));
        let hostname = self.read_field("hostname");
        let uptime = self.read_field("uptime -p").map(|out| normalize_uptime(&out));
        let os = match fs::read_to_string(&self.os_release) {
            Ok(content) => parse_os_release(&content),
            Err(e) => {
                self.logger.debug(format!(
                    "Cannot read {}: {}",
                    self.os_release.display(),
                    e
                ));
                None
            }
        };

        let or_unknown = |value: Option<String>| {
            value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };

        ServerInfo {
            public_ip: or_unknown(public_ip),
            local_ip: or_unknown(local_ip),
            hostname: or_unknown(hostname),
            uptime: or_unknown(uptime),
            os: or_unknown(os),
        }
    }

    /// Restart the first alias that accepts it, then confirm it is active
    /// when verification is enabled.
    pub fn restart(&self) -> AdminResult<RestartOutcome> {
        let mut last_error: Option<AdminError> = None;

        for alias in self.aliases() {
            let command = self.privileged(&format!("systemctl restart {}", shell_quote(alias)));
            let result = self.run(&command)?;

            if !result.success {
                let err = AdminError::from_command(&result, "Failed to restart service");
                if result.failure_kind == FailureKind::AuthRequired {
                    return Err(err);
                }
                self.logger
                    .debug(format!("Restart of {} failed: {}", alias, err));
                last_error = Some(err);
                continue;
            }

            self.logger.info(format!("Service {} restarted", alias));
            if !self.config.verify_restart {
                return Ok(RestartOutcome {
                    service_alias: alias.to_string(),
                    verified: false,
                });
            }

            if !self.config.restart_settle.is_zero() {
                thread::sleep(self.config.restart_settle);
            }
            if self.is_active(alias) {
                return Ok(RestartOutcome {
                    service_alias: alias.to_string(),
                    verified: true,
                });
            }
            return Err(AdminError::PartialSuccess(format!(
                "Service {} was restarted but is not active",
                alias
            )));
        }

        Err(last_error.unwrap_or_else(|| {
            AdminError::ExternalToolFailure("No service alias is configured".to_string())
        }))
    }

    fn is_active(&self, alias: &str) -> bool {
        let command = format!("systemctl is-active {}", shell_quote(alias));
        match self.runner.execute(&command, &self.options()) {
            Ok(result) => result.success && result.stdout.trim() == "active",
            Err(e) => {
                self.logger.warn(format!("Status check for {} failed: {}", alias, e));
                false
            }
        }
    }

    fn read_field(&self, command: &str) -> Option<String> {
        match self.runner.execute(command, &self.options()) {
            Ok(result) if result.success => Some(result.stdout.trim().to_string()),
            Ok(result) => {
                self.logger.debug(format!(
                    "'{}' failed ({}): {}",
                    command,
                    result.failure_kind,
                    result.error_text()
                ));
                None
            }
            Err(e) => {
                self.logger.debug(format!("'{}' failed: {}", command, e));
                None
            }
        }
    }

    fn run(&self, command: &str) -> AdminResult<CommandResult> {
        Ok(self.runner.execute(command, &self.options())?)
    }

    fn options(&self) -> CommandOptions {
        CommandOptions::from_config(&self.config)
    }

    fn privileged(&self, command: &str) -> String {
        if self.config.dialect.use_sudo {
            format!("sudo -n {}", command)
        } else {
            command.to_string()
        }
    }

    fn aliases(&self) -> impl Iterator<Item = &str> {
        self.config.service_aliases.iter().map(String::as_str)
    }
}

/// `up 3 days, 4 hours` -> `3 days, 4 hours`
pub fn normalize_uptime(output: &str) -> String {
    let trimmed = output.trim();
    trimmed.strip_prefix("up ").unwrap_or(trimmed).trim().to_string()
}

/// `PRETTY_NAME` from os-release content, quotes removed
pub fn parse_os_release(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
        .filter(|value| !value.is_empty())
}

/// Journal output that only carries `-- ... --` markers such as `-- No entries --`
fn is_empty_journal(output: &str) -> bool {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    if lines.peek().is_none() {
        return true;
    }
    let mut saw_no_entries = false;
    for line in lines {
        if line == NO_JOURNAL_ENTRIES {
            saw_no_entries = true;
        } else if !line.starts_with("-- ") {
            return false;
        }
    }
    saw_no_entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uptime() {
        assert_eq!(normalize_uptime("up 3 days, 4 hours\n"), "3 days, 4 hours");
        assert_eq!(normalize_uptime("12 minutes"), "12 minutes");
    }

    #[test]
    fn test_parse_os_release() {
        let content = "NAME=\"Raspbian GNU/Linux\"\nPRETTY_NAME=\"Raspbian GNU/Linux 11 (bullseye)\"\nID=raspbian\n";
        assert_eq!(
            parse_os_release(content).as_deref(),
            Some("Raspbian GNU/Linux 11 (bullseye)")
        );
        assert_eq!(parse_os_release("ID=debian\n"), None);
        assert_eq!(parse_os_release("PRETTY_NAME=\"\"\n"), None);
    }

    #[test]
    fn test_empty_journal_detection() {
        assert!(is_empty_journal("-- No entries --\n"));
        assert!(is_empty_journal(
            "-- Logs begin at Mon 2024-01-01 00:00:00 UTC. --\n-- No entries --\n"
        ));
        assert!(is_empty_journal("   \n"));
        assert!(!is_empty_journal(
            "-- Logs begin at Mon 2024-01-01. --\nJan 01 ovpn-server[1]: Initialization Sequence Completed\n"
        ));
    }
}
