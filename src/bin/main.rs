//! vpnadm CLI
//!
//! A command-line front end for administering VPN users:
//! - List, create and revoke users through the client-management tool
//! - Show connected clients from the status log or the tool itself
//! - Check, restart and read the journal of the VPN service
//! - Report basic server information

use std::env;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use serde::Serialize;

use vpn_admin::{
    args_parser::{parse_args, AdminCommand},
    config::AdminConfig,
    error::ApiResponse,
    formatter::{format_response, OutputFormat, TextRender},
    lifecycle::ArtifactInfo,
    logging::{Logger, ROOT_TARGET},
    runner::{is_command_available, CommandRunner, SystemRunner},
    ClientMonitor, StatusGateway, UserLifecycle,
};

/// Exit code for a failed operation
const EXIT_FAILURE: i32 = 1;
/// Exit code for a malformed command line
const EXIT_USAGE: i32 = 2;

/// Artifact metadata plus its text, for JSON downloads
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactDownload {
    #[serde(flatten)]
    info: ArtifactInfo,
    content: String,
}

impl TextRender for ArtifactDownload {
    fn render_text(&self) -> String {
        self.content.clone()
    }
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = AdminConfig::from_env();

    // Handle --version flag
    let has_version_flag = !args.is_empty() && (args[0] == "--version" || args[0] == "-v");
    if has_version_flag {
        let verbose = config.verbose || args.iter().any(|a| a == "--verbose");
        init_logging(verbose);
        print_version(&config, verbose);
        process::exit(0);
    }

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        process::exit(0);
    }

    let parsed = match parse_args(&args) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run 'vpnadm --help' for usage.");
            process::exit(EXIT_USAGE);
        }
    };

    let verbose = parsed.verbose || config.verbose;
    init_logging(verbose);

    let logger = Logger::new(ROOT_TARGET, verbose);
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new(logger.child("runner")));
    logger.debug(format!("Running command: {}", parsed.command.name()));

    let code = run_command(parsed.command, parsed.output_format, &config, runner, &logger);
    process::exit(code);
}

/// Initialise the `log` backend; `RUST_LOG` overrides the default level
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

/// Dispatch one command and print its response; returns the exit code
fn run_command(
    command: AdminCommand,
    format: OutputFormat,
    config: &AdminConfig,
    runner: Arc<dyn CommandRunner>,
    logger: &Logger,
) -> i32 {
    let lifecycle = || UserLifecycle::new(Arc::clone(&runner), config.clone(), logger);
    let gateway = || StatusGateway::new(Arc::clone(&runner), config.clone(), logger);

    match command {
        AdminCommand::List => emit(ApiResponse::from(lifecycle().list_users()), format),
        AdminCommand::Add { username, days } => {
            let result = match days {
                Some(days) => lifecycle().create_with_validity(&username, Some(days)),
                None => lifecycle().create(&username),
            };
            emit(
                ApiResponse::from_result(result, |user| {
                    Some(format!("User {} created successfully", user.username))
                }),
                format,
            )
        }
        AdminCommand::Revoke { username } => emit(
            ApiResponse::from_result(lifecycle().revoke(&username), |user| {
                Some(format!("User {} revoked successfully", user.username))
            }),
            format,
        ),
        AdminCommand::Clients => {
            let listing = ClientMonitor::new(Arc::clone(&runner), config.clone(), logger)
                .connected_clients();
            let count = listing.count();
            emit(
                ApiResponse::ok_with_message(listing, format!("{} client(s) connected", count)),
                format,
            )
        }
        AdminCommand::Status => emit(ApiResponse::ok(gateway().get_service_status()), format),
        AdminCommand::Logs { lines } => emit(ApiResponse::from(gateway().get_logs(lines)), format),
        AdminCommand::Info => emit(ApiResponse::ok(gateway().get_server_info()), format),
        AdminCommand::Restart => emit(
            ApiResponse::from_result(gateway().restart(), |outcome| {
                Some(format!(
                    "Service {} restarted successfully",
                    outcome.service_alias
                ))
            }),
            format,
        ),
        AdminCommand::Download { username } => download(&lifecycle(), &username, format),
    }
}

/// Text mode writes the raw artifact; JSON mode wraps it in a response
fn download(lifecycle: &UserLifecycle, username: &str, format: OutputFormat) -> i32 {
    let info = match lifecycle.artifact(username) {
        Ok(info) => info,
        Err(e) => return emit(ApiResponse::<ArtifactDownload>::failure(&e), format),
    };
    let bytes = match lifecycle.read_artifact(username) {
        Ok(bytes) => bytes,
        Err(e) => return emit(ApiResponse::<ArtifactDownload>::failure(&e), format),
    };

    if format == OutputFormat::Text {
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(&bytes).and_then(|_| stdout.flush()) {
            eprintln!("Error: Failed to write configuration: {}", e);
            return EXIT_FAILURE;
        }
        return 0;
    }

    let download = ArtifactDownload {
        info,
        content: String::from_utf8_lossy(&bytes).into_owned(),
    };
    emit(ApiResponse::ok(download), format)
}

/// Print a response; failures go to stderr in text mode
fn emit<T: Serialize + TextRender>(response: ApiResponse<T>, format: OutputFormat) -> i32 {
    let code = if response.success { 0 } else { EXIT_FAILURE };

    match format_response(&response, format) {
        Ok(output) if response.success || format == OutputFormat::Json => println!("{}", output),
        Ok(output) => eprintln!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
    }

    code
}

/// Print version information
fn print_version(config: &AdminConfig, verbose: bool) {
    let version = env!("CARGO_PKG_VERSION");
    println!("vpnadm version: {}", version);
    println!();

    println!("OS: {}", std::env::consts::OS);
    println!("Architecture: {}", std::env::consts::ARCH);
    println!();

    // Check for the external tools every command relies on
    println!("External tools:");

    let logger = Logger::new(ROOT_TARGET, verbose);
    let runner = SystemRunner::new(logger.child("runner"));
    let tools = [
        config.dialect.program.as_str(),
        "sudo",
        "systemctl",
        "journalctl",
        "curl",
    ];
    for tool in tools {
        let state = if is_command_available(&runner, tool) {
            "available"
        } else {
            "not found"
        };
        println!("  {}: {}", tool, state);
    }
}

/// Print usage information
fn print_usage() {
    println!(
        r#"Usage: vpnadm [options] <command> [args...]

Commands:
  list                       List users and their certificate status
  add <name> [--days <n>]    Create a user (passwordless unless --days is given)
  revoke <name>              Revoke a user and delete their configuration file
  clients                    Show connected clients
  status                     Show VPN service status
  logs [--lines <n>]         Show the service journal (default 200 lines, max 5000)
  info                       Show public/local IP, hostname, uptime and OS
  restart                    Restart the VPN service
  download <name>            Write a user's configuration file to stdout

Options:
  --output-format <format>   Output format: json or text (default: text)
  --verbose                  Log debug details to stderr
  --version, -v              Show version information
  --help, -h                 Show this help

Environment:
  VPNADM_TOOL                Client-management program (default: pivpn)
  VPNADM_SUDO                Set to 0 to run commands without "sudo -n"
  VPNADM_SERVICES            Comma-separated service names to try
  VPNADM_STATUS_LOGS         Colon-separated status log paths to try
  VPNADM_ARTIFACT_DIR        Directory holding <name>.ovpn files (default: ~/ovpns)
  VPNADM_TIMEOUT_MS          Per-command timeout (default: 30000)
  VPNADM_VERBOSE             Same as --verbose

Examples:
  vpnadm list
  vpnadm add alice --days 1080
  vpnadm revoke alice
  vpnadm --output-format json clients
  vpnadm logs --lines 50
  vpnadm download alice > alice.ovpn"#
    );
}
