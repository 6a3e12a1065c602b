//! Argument parser for the vpnadm command line
//!
//! Syntax:
//! $ vpnadm [global-options] <command> [command-args]
//!
//! Global options (accepted anywhere on the line):
//! --output-format <format>   json or text (default: text)
//! --verbose                  Debug logging to stderr
//!
//! Commands:
//! list                       List users
//! add <name> [--days <n>]    Create a user
//! revoke <name>              Revoke a user
//! clients                    Connected clients
//! status                     Service status
//! logs [--lines <n>]         Service journal
//! info                       Server information
//! restart                    Restart the service
//! download <name>            Write a user's configuration to stdout

use crate::formatter::{OutputFormat, VALID_OUTPUT_FORMATS};
use crate::status::DEFAULT_LOG_LINES;

/// Command names, in the order they are listed in the usage text
pub const VALID_COMMANDS: [&str; 9] = [
    "list", "add", "revoke", "clients", "status", "logs", "info", "restart", "download",
];

/// Subcommand with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    List,
    Add { username: String, days: Option<u32> },
    Revoke { username: String },
    Clients,
    Status,
    Logs { lines: usize },
    Info,
    Restart,
    Download { username: String },
}

impl AdminCommand {
    pub fn name(&self) -> &'static str {
        match self {
            AdminCommand::List => "list",
            AdminCommand::Add { .. } => "add",
            AdminCommand::Revoke { .. } => "revoke",
            AdminCommand::Clients => "clients",
            AdminCommand::Status => "status",
            AdminCommand::Logs { .. } => "logs",
            AdminCommand::Info => "info",
            AdminCommand::Restart => "restart",
            AdminCommand::Download { .. } => "download",
        }
    }
}

/// Options that apply to every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Output format as given on the command line (validated later)
    pub output_format: Option<String>,
    pub verbose: bool,
    /// Per-command options collected while scanning
    pub days: Option<String>,
    pub lines: Option<String>,
}

/// Result of parsing arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArgs {
    pub command: AdminCommand,
    pub output_format: OutputFormat,
    pub verbose: bool,
}

/// Parse command line arguments (without the program name)
pub fn parse_args(args: &[String]) -> Result<ParsedArgs, String> {
    let mut options = GlobalOptions::default();
    let mut positional: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg.starts_with('-') && arg.len() > 1 {
            match parse_option(args, i, &mut options)? {
                0 => return Err(format!("Unknown option: {}", arg)),
                consumed => i += consumed,
            }
        } else {
            positional.push(arg.clone());
            i += 1;
        }
    }

    let command = build_command(&positional, &options)?;
    let output_format = validate_options(&options, &command)?;

    Ok(ParsedArgs {
        command,
        output_format,
        verbose: options.verbose,
    })
}

/// Parse a single option from args array
/// Returns number of arguments consumed (0 if not recognized)
fn parse_option(args: &[String], index: usize, options: &mut GlobalOptions) -> Result<usize, String> {
    let arg = &args[index];

    // --output-format <format>
    if arg == "--output-format" {
        options.output_format = Some(option_value(args, index, "a format")?.to_lowercase());
        return Ok(2);
    }

    // --output-format=<value>
    if let Some(value) = arg.strip_prefix("--output-format=") {
        options.output_format = Some(value.to_lowercase());
        return Ok(1);
    }

    // --verbose
    if arg == "--verbose" {
        options.verbose = true;
        return Ok(1);
    }

    // --days <n> (add)
    if arg == "--days" || arg == "-d" {
        options.days = Some(option_value(args, index, "a number of days")?);
        return Ok(2);
    }

    if let Some(value) = arg.strip_prefix("--days=") {
        options.days = Some(value.to_string());
        return Ok(1);
    }

    // --lines <n> (logs)
    if arg == "--lines" || arg == "-n" {
        options.lines = Some(option_value(args, index, "a line count")?);
        return Ok(2);
    }

    if let Some(value) = arg.strip_prefix("--lines=") {
        options.lines = Some(value.to_string());
        return Ok(1);
    }

    // Not a recognized option
    Ok(0)
}

fn option_value(args: &[String], index: usize, what: &str) -> Result<String, String> {
    match args.get(index + 1) {
        Some(value) if !value.starts_with('-') => Ok(value.clone()),
        _ => Err(format!("Option {} requires {} argument", args[index], what)),
    }
}

fn build_command(positional: &[String], options: &GlobalOptions) -> Result<AdminCommand, String> {
    let Some((name, rest)) = positional.split_first() else {
        return Err("No command provided".to_string());
    };

    let expected_args = match name.as_str() {
        "add" | "revoke" | "download" => 1,
        _ => 0,
    };
    if rest.len() != expected_args {
        return Err(if expected_args == 1 && rest.is_empty() {
            format!("Command {} requires a username argument", name)
        } else {
            format!("Unexpected argument for {}: {}", name, rest[expected_args])
        });
    }
    let username = || rest[0].clone();

    let command = match name.as_str() {
        "list" => AdminCommand::List,
        "add" => AdminCommand::Add {
            username: username(),
            days: options
                .days
                .as_deref()
                .map(|d| parse_number(d, "--days"))
                .transpose()?,
        },
        "revoke" => AdminCommand::Revoke {
            username: username(),
        },
        "clients" => AdminCommand::Clients,
        "status" => AdminCommand::Status,
        "logs" => AdminCommand::Logs {
            lines: options
                .lines
                .as_deref()
                .map(|n| parse_number(n, "--lines"))
                .transpose()?
                .unwrap_or(DEFAULT_LOG_LINES),
        },
        "info" => AdminCommand::Info,
        "restart" => AdminCommand::Restart,
        "download" => AdminCommand::Download {
            username: username(),
        },
        other => {
            return Err(format!(
                "Unknown command: \"{}\". Valid commands are: {}",
                other,
                VALID_COMMANDS.join(", ")
            ))
        }
    };

    Ok(command)
}

fn parse_number<T: std::str::FromStr>(value: &str, option: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value for {}: \"{}\"", option, value))
}

/// Validate parsed options against the command and resolve the output format
pub fn validate_options(options: &GlobalOptions, command: &AdminCommand) -> Result<OutputFormat, String> {
    // --days is only valid with add
    if options.days.is_some() && !matches!(command, AdminCommand::Add { .. }) {
        return Err("--days option is only valid with add".to_string());
    }

    // --lines is only valid with logs
    if options.lines.is_some() && !matches!(command, AdminCommand::Logs { .. }) {
        return Err("--lines option is only valid with logs".to_string());
    }

    match options.output_format {
        Some(ref format) => {
            if !VALID_OUTPUT_FORMATS.contains(&format.as_str()) {
                return Err(format!(
                    "Invalid output format: \"{}\". Valid options are: {}",
                    format,
                    VALID_OUTPUT_FORMATS.join(", ")
                ));
            }
            OutputFormat::parse(format)
        }
        None => Ok(OutputFormat::default()),
    }
}
