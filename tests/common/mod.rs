//! Shared test double for the integration tests
//!
//! `FakeHost` answers the command lines the library issues as a small
//! simulated host would: a PiVPN-like tool with its own user table and
//! artifact directory, systemd units, and a journal. Every command line is
//! recorded so tests can assert on what was (or was not) run.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use vpn_admin::{
    AdminConfig, CommandOptions, CommandResult, CommandRunner, RunnerError, UserStatus,
};

pub const TOOL: &str = "pivpn";

#[derive(Default)]
struct HostState {
    users: BTreeMap<String, UserStatus>,
    active_units: HashSet<String>,
    restartable_units: HashSet<String>,
    journals: HashMap<String, String>,
}

pub struct FakeHost {
    artifact_dir: PathBuf,
    state: Mutex<HostState>,
    calls: Mutex<Vec<String>>,
    overrides: Mutex<Vec<(String, CommandResult)>>,
    /// Answer `-l --json` with a JSON array instead of an error
    pub structured_output: bool,
    /// Create users without writing their artifact
    pub skip_artifact: bool,
    /// Revoke users but report a failing exit status
    pub revoke_exit_code: Option<i32>,
    /// Report revoke failure without changing state
    pub revoke_noop: bool,
}

impl FakeHost {
    pub fn new(artifact_dir: &Path) -> Self {
        Self {
            artifact_dir: artifact_dir.to_path_buf(),
            state: Mutex::new(HostState::default()),
            calls: Mutex::new(Vec::new()),
            overrides: Mutex::new(Vec::new()),
            structured_output: false,
            skip_artifact: false,
            revoke_exit_code: None,
            revoke_noop: false,
        }
    }

    /// Pre-existing user, with artifact
    pub fn with_user(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(name.to_string(), UserStatus::Active);
        self.write_artifact(name);
        self
    }

    pub fn with_active_unit(self, unit: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .active_units
            .insert(unit.to_string());
        self
    }

    pub fn with_restartable_unit(self, unit: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .restartable_units
            .insert(unit.to_string());
        self
    }

    pub fn with_journal(self, unit: &str, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .journals
            .insert(unit.to_string(), text.to_string());
        self
    }

    /// Any command line containing `pattern` gets `result`; first match wins
    pub fn with_override(self, pattern: &str, result: CommandResult) -> Self {
        self.overrides
            .lock()
            .unwrap()
            .push((pattern.to_string(), result));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, pattern: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.contains(pattern))
            .collect()
    }

    pub fn user_status(&self, name: &str) -> Option<UserStatus> {
        self.state.lock().unwrap().users.get(name).copied()
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.artifact_dir.join(format!("{}.ovpn", name))
    }

    fn write_artifact(&self, name: &str) {
        fs::write(
            self.artifact(name),
            format!("client\ndev tun\nremote vpn.example.org 1194\n# {}\n", name),
        )
        .unwrap();
    }

    fn tool_args<'a>(command: &'a str) -> Option<Vec<&'a str>> {
        let mut tokens = command.split_whitespace();
        tokens.by_ref().find(|t| *t == TOOL)?;
        Some(tokens.collect())
    }

    fn run_tool(&self, args: &[&str]) -> CommandResult {
        let flag_value = |flag: &str| {
            args.iter()
                .position(|a| *a == flag)
                .and_then(|i| args.get(i + 1))
                .map(|s| s.to_string())
        };

        match args.first().copied() {
            Some("-l") if args.contains(&"--json") => {
                if !self.structured_output {
                    return CommandResult::failed(1, "Unknown option: --json");
                }
                let state = self.state.lock().unwrap();
                let items: Vec<serde_json::Value> = state
                    .users
                    .iter()
                    .map(|(name, status)| {
                        let label = status_label(*status);
                        serde_json::json!({
                            "name": name,
                            "status": label,
                            "expires": "2031-06-06"
                        })
                    })
                    .collect();
                CommandResult::ok(serde_json::Value::Array(items).to_string())
            }
            Some("-l") => {
                let state = self.state.lock().unwrap();
                let mut out = String::from(
                    ": NOTE : The first entry is the server's certificate\n\
                     ::: Certificate Status List :::\n \
                     ::  Status  ::  Name               ::  Expiration\n",
                );
                for (name, status) in &state.users {
                    let label = status_label(*status);
                    out.push_str(&format!("    {:<8} ::  {:<18} ::  Jun 06 2031\n", label, name));
                }
                out.push_str("::: Run 'pivpn -h' for help :::\n");
                CommandResult::ok(out)
            }
            Some("-a") => {
                let Some(name) = flag_value("-n") else {
                    return CommandResult::failed(1, "::: Missing client name");
                };
                let mut state = self.state.lock().unwrap();
                if state.users.get(&name) == Some(&UserStatus::Active) {
                    let mut result = CommandResult::failed(1, "");
                    result.stdout = format!("A client named {} already exists", name);
                    return result;
                }
                state.users.insert(name.clone(), UserStatus::Active);
                drop(state);
                if !self.skip_artifact {
                    self.write_artifact(&name);
                }
                CommandResult::ok(format!("::: Client {} created\n", name))
            }
            Some("-r") => {
                let Some(name) = args.get(1).map(|s| s.to_string()) else {
                    return CommandResult::failed(1, "::: Missing client name");
                };
                if self.revoke_noop {
                    return CommandResult::failed(1, "::: Revocation failed");
                }
                let mut state = self.state.lock().unwrap();
                if state.users.get(&name) != Some(&UserStatus::Active) {
                    return CommandResult::failed(1, format!("::: {} does not exist", name));
                }
                state.users.insert(name.clone(), UserStatus::Revoked);
                match self.revoke_exit_code {
                    Some(code) => CommandResult::failed(code, "::: easyrsa returned an error"),
                    None => CommandResult::ok(format!("::: Certificate {} revoked\n", name)),
                }
            }
            Some("-c") => CommandResult::ok(
                "::: Client Status List :::\n\
                 Name  Remote IP  Virtual IP  Bytes Received  Bytes Sent  Connected Since\n",
            ),
            _ => CommandResult::failed(1, "::: Unknown option"),
        }
    }

    fn run_systemctl(&self, args: &[&str]) -> CommandResult {
        let state = self.state.lock().unwrap();
        match args {
            ["is-active", unit] if state.active_units.contains(*unit) => CommandResult::ok("active\n"),
            ["is-active", _] => {
                let mut result = CommandResult::failed(3, "");
                result.stdout = "inactive\n".to_string();
                result
            }
            ["restart", unit] if state.restartable_units.contains(*unit) => CommandResult::ok(""),
            ["restart", unit] => CommandResult::failed(
                5,
                format!("Failed to restart {}.service: Unit {}.service not found.", unit, unit),
            ),
            _ => CommandResult::failed(1, "Unknown operation"),
        }
    }

    fn run_journalctl(&self, args: &[&str]) -> CommandResult {
        let unit = args
            .iter()
            .position(|a| *a == "-u")
            .and_then(|i| args.get(i + 1))
            .copied()
            .unwrap_or("");
        let state = self.state.lock().unwrap();
        match state.journals.get(unit) {
            Some(text) => CommandResult::ok(text.clone()),
            None => CommandResult::ok("-- No entries --\n"),
        }
    }
}

impl CommandRunner for FakeHost {
    fn execute(
        &self,
        command_line: &str,
        _options: &CommandOptions,
    ) -> Result<CommandResult, RunnerError> {
        if command_line.trim().is_empty() {
            return Err(RunnerError::EmptyCommand);
        }
        self.calls.lock().unwrap().push(command_line.to_string());

        if let Some((_, result)) = self
            .overrides
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| command_line.contains(pattern.as_str()))
        {
            return Ok(result.clone());
        }

        if let Some(args) = Self::tool_args(command_line) {
            return Ok(self.run_tool(&args));
        }

        let tokens: Vec<&str> = command_line
            .split_whitespace()
            .skip_while(|t| *t == "sudo" || *t == "-n")
            .collect();
        let result = match tokens.split_first() {
            Some((&"systemctl", rest)) => self.run_systemctl(rest),
            Some((&"journalctl", rest)) => self.run_journalctl(rest),
            _ => CommandResult::failed(
                127,
                format!("sh: 1: {}: not found", tokens.first().unwrap_or(&"")),
            ),
        };
        Ok(result)
    }
}

fn status_label(status: UserStatus) -> &'static str {
    match status {
        UserStatus::Active => "Valid",
        UserStatus::Revoked => "Revoked",
    }
}

/// Configuration pointing at `artifact_dir`, with no readable status logs
pub fn test_config(artifact_dir: &Path) -> AdminConfig {
    AdminConfig {
        artifact_dir: artifact_dir.to_path_buf(),
        status_log_paths: vec![artifact_dir.join("missing-status.log")],
        restart_settle: Duration::ZERO,
        ..AdminConfig::default()
    }
}
