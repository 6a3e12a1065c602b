//! vpn-admin library
//!
//! Administers VPN user accounts by driving the host's client-management
//! CLI, the service manager and the system journal, and by parsing their
//! loosely formatted output into typed records.

pub mod args_parser;
pub mod clients;
pub mod config;
pub mod error;
pub mod formatter;
pub mod lifecycle;
pub mod locks;
pub mod logging;
pub mod runner;
pub mod sanitizer;
pub mod status;
pub mod table;
pub mod user_list;
pub mod username;

// Re-export commonly used items
pub use args_parser::{parse_args, AdminCommand, ParsedArgs, VALID_COMMANDS};
pub use clients::{
    parse_client_table, parse_status_log, ClientListing, ClientMonitor, ClientSource,
    ConnectedClient, ConnectedSince,
};
pub use config::{AdminConfig, ToolDialect};
pub use error::{AdminError, AdminResult, ApiResponse, ErrorKind};
pub use formatter::{format_bytes, format_response, OutputFormat, TextRender};
pub use lifecycle::{ArtifactInfo, CreatedUser, RevokedUser, UserLifecycle};
pub use locks::{KeyGuard, KeyedLocks};
pub use logging::Logger;
pub use runner::{
    is_command_available, CommandOptions, CommandResult, CommandRunner, FailureKind, RunnerError,
    SystemRunner,
};
pub use sanitizer::sanitize;
pub use status::{RestartOutcome, ServerInfo, ServiceLogs, ServiceStatus, StatusGateway};
pub use user_list::{parse_user_list, UserListParser, UserRecord, UserStatus};
pub use username::{is_valid_username, validate_username};
