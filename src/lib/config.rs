//! Configuration for vpn-admin
//!
//! Which management tool to drive, which service names to try, where the
//! status logs and per-user artifacts live. Everything that differs between
//! deployments is a value here rather than a code path.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default time budget for one external command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Default cap on captured output per stream
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 512 * 1024;
/// Default pause between restart and the follow-up status check
pub const DEFAULT_RESTART_SETTLE: Duration = Duration::from_secs(2);

/// Service names tried, in order, for status, logs and restart
pub const DEFAULT_SERVICE_ALIASES: [&str; 3] = ["openvpn@server", "openvpn-server@server", "openvpn"];

/// Conventional status-log locations, highest priority first
pub const DEFAULT_STATUS_LOG_PATHS: [&str; 5] = [
    "/var/log/openvpn-status.log",
    "/var/log/openvpn/openvpn-status.log",
    "/etc/openvpn/openvpn-status.log",
    "/run/openvpn-server/status-server.log",
    "/var/log/openvpn/status.log",
];

/// Command-line dialect of the client-management tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDialect {
    /// Program name, also used to recognise the tool's own banner lines
    pub program: String,
    /// Prefix non-interactive privilege escalation (`sudo -n`)
    pub use_sudo: bool,
    pub list_flag: String,
    /// Flag that asks the list subcommand for machine-readable output
    pub structured_flag: Option<String>,
    pub add_flag: String,
    pub name_flag: String,
    pub passwordless_flag: String,
    pub days_flag: String,
    pub revoke_flag: String,
    pub clients_flag: String,
}

impl Default for ToolDialect {
    fn default() -> Self {
        Self::pivpn()
    }
}

impl ToolDialect {
    /// The PiVPN dialect (`pivpn -l`, `pivpn -a -n <name> -p`, ...)
    pub fn pivpn() -> Self {
        Self {
            program: "pivpn".to_string(),
            use_sudo: true,
            list_flag: "-l".to_string(),
            structured_flag: Some("--json".to_string()),
            add_flag: "-a".to_string(),
            name_flag: "-n".to_string(),
            passwordless_flag: "-p".to_string(),
            days_flag: "-d".to_string(),
            revoke_flag: "-r".to_string(),
            clients_flag: "-c".to_string(),
        }
    }

    fn invocation(&self) -> String {
        if self.use_sudo {
            format!("sudo -n {}", self.program)
        } else {
            self.program.clone()
        }
    }

    /// `sudo -n pivpn -l`
    pub fn list_command(&self) -> String {
        format!("{} {}", self.invocation(), self.list_flag)
    }

    /// `sudo -n pivpn -l --json`, when the dialect has a structured mode
    pub fn structured_list_command(&self) -> Option<String> {
        self.structured_flag
            .as_ref()
            .map(|flag| format!("{} {}", self.list_command(), flag))
    }

    /// `sudo -n pivpn -a -n <name> -p` or `... -d <days>`.
    ///
    /// `username` must already have passed validation.
    pub fn add_command(&self, username: &str, validity_days: Option<u32>) -> String {
        let validity = match validity_days {
            Some(days) => format!("{} {}", self.days_flag, days),
            None => self.passwordless_flag.clone(),
        };
        format!(
            "{} {} {} {} {}",
            self.invocation(),
            self.add_flag,
            self.name_flag,
            username,
            validity
        )
    }

    /// `yes | sudo -n pivpn -r <name>`; the piped `yes` answers the confirmation prompt
    pub fn revoke_command(&self, username: &str) -> String {
        format!("yes | {} {} {}", self.invocation(), self.revoke_flag, username)
    }

    /// `sudo -n pivpn -c`
    pub fn clients_command(&self) -> String {
        format!("{} {}", self.invocation(), self.clients_flag)
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub dialect: ToolDialect,
    pub service_aliases: Vec<String>,
    pub status_log_paths: Vec<PathBuf>,
    /// Directory holding one `<username>.<extension>` file per user
    pub artifact_dir: PathBuf,
    pub artifact_extension: String,
    /// Certificate validity passed to the add command; `None` means passwordless default
    pub validity_days: Option<u32>,
    /// Try the tool's structured list output before text parsing
    pub structured_listing: bool,
    pub command_timeout: Duration,
    pub max_output_bytes: usize,
    /// Re-check `is-active` after a successful restart
    pub verify_restart: bool,
    pub restart_settle: Duration,
    pub public_ip_url: String,
    pub verbose: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            dialect: ToolDialect::default(),
            service_aliases: DEFAULT_SERVICE_ALIASES.iter().map(|s| s.to_string()).collect(),
            status_log_paths: DEFAULT_STATUS_LOG_PATHS.iter().map(PathBuf::from).collect(),
            artifact_dir: default_artifact_dir(),
            artifact_extension: "ovpn".to_string(),
            validity_days: None,
            structured_listing: true,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            verify_restart: true,
            restart_settle: DEFAULT_RESTART_SETTLE,
            public_ip_url: "ifconfig.me".to_string(),
            verbose: false,
        }
    }
}

impl AdminConfig {
    /// Read `VPNADM_*` environment variables on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(program) = env_string("VPNADM_TOOL") {
            config.dialect.program = program;
        }
        if let Ok(value) = env::var("VPNADM_SUDO") {
            config.dialect.use_sudo = !(value == "0" || value == "false");
        }
        if let Some(services) = env_string("VPNADM_SERVICES") {
            let aliases = split_list(&services, ',');
            if !aliases.is_empty() {
                config.service_aliases = aliases;
            }
        }
        if let Some(paths) = env_string("VPNADM_STATUS_LOGS") {
            let paths: Vec<PathBuf> = split_list(&paths, ':').into_iter().map(PathBuf::from).collect();
            if !paths.is_empty() {
                config.status_log_paths = paths;
            }
        }
        if let Some(dir) = env_string("VPNADM_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }
        if let Some(ext) = env_string("VPNADM_ARTIFACT_EXT") {
            config.artifact_extension = ext.trim_start_matches('.').to_string();
        }
        if let Some(days) = env_parse::<u32>("VPNADM_VALIDITY_DAYS") {
            config.validity_days = if days == 0 { None } else { Some(days) };
        }
        if let Ok(value) = env::var("VPNADM_STRUCTURED_LIST") {
            config.structured_listing = value == "1" || value == "true";
        }
        if let Some(ms) = env_parse::<u64>("VPNADM_TIMEOUT_MS") {
            if ms > 0 {
                config.command_timeout = Duration::from_millis(ms);
            }
        }
        if let Some(bytes) = env_parse::<usize>("VPNADM_MAX_OUTPUT") {
            if bytes > 0 {
                config.max_output_bytes = bytes;
            }
        }
        if let Ok(value) = env::var("VPNADM_VERIFY_RESTART") {
            config.verify_restart = value == "1" || value == "true";
        }
        if let Some(ms) = env_parse::<u64>("VPNADM_RESTART_SETTLE_MS") {
            config.restart_settle = Duration::from_millis(ms);
        }
        if let Some(url) = env_string("VPNADM_PUBLIC_IP_URL") {
            config.public_ip_url = url;
        }
        config.verbose = env_bool("VPNADM_VERBOSE");

        config
    }
}

/// `$HOME/ovpns`, the directory PiVPN writes client profiles to
pub fn default_artifact_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("ovpns"))
        .unwrap_or_else(|| PathBuf::from("/home/pi/ovpns"))
}

pub fn env_bool(name: &str) -> bool {
    env::var(name).is_ok_and(|v| v == "1" || v == "true")
}

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in value.split(separator).map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}
