//! Connected-client listing for vpn-admin
//!
//! Two sources describe who is connected right now:
//! - the daemon's status log (version 1 or 2), read directly from the
//!   first configured path that exists, is readable and looks like one
//! - the management tool's client table (`pivpn -c`), used when no log is readable
//!
//! When neither works the listing is empty; [`ClientListing::source`] tells
//! the two cases apart for diagnostics.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::config::AdminConfig;
use crate::logging::Logger;
use crate::runner::{CommandOptions, CommandRunner};
use crate::sanitizer::{is_separator_line, sanitize_bytes};
use crate::table::{data_tokens, detect_header, is_noise_line};
use crate::username::is_valid_username;

/// Sentinel opening every client record in the status log
const CLIENT_LIST_SENTINEL: &str = "CLIENT_LIST";
/// Column-layout line emitted by status version 2
const HEADER_SENTINEL: &str = "HEADER";
/// First line of a version 2 log
const TITLE_SENTINEL: &str = "TITLE";
/// Sentinels that end the client section
const END_SENTINELS: [&str; 2] = ["ROUTING_TABLE", "GLOBAL_STATS"];
/// Version 1 section markers
const LEGACY_TITLE: &str = "OpenVPN CLIENT LIST";
const LEGACY_ROUTING_MARKER: &str = "ROUTING TABLE";
const LEGACY_END_MARKERS: [&str; 2] = ["GLOBAL STATS", "END"];
/// Stand-in for values a source does not provide
const NOT_AVAILABLE: &str = "N/A";
/// Placeholder common name for clients that have not authenticated yet
const UNDEF_NAME: &str = "UNDEF";

/// Header words (prefixes) that mark the client table's header row
const CLIENT_COLUMN_WORDS: [&str; 6] = ["remote", "real", "virtual", "bytes", "connected", "since"];

/// Human-readable byte count such as `1.2MiB`, `345KB` or `10 B`
const BYTE_SIZE_PATTERN: &str = r"^(?i)(\d+(?:\.\d+)?)\s*([kmgtp]?)(?:i?b)?$";

fn byte_size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BYTE_SIZE_PATTERN).expect("byte size pattern is valid"))
}

/// When a client connected: a real instant when the source gives epoch
/// seconds, otherwise the source's own text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectedSince {
    Timestamp(DateTime<Utc>),
    Raw(String),
}

impl ConnectedSince {
    /// Epoch seconds become a timestamp; anything else is kept verbatim
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            if let Some(ts) = value
                .parse::<i64>()
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            {
                return ConnectedSince::Timestamp(ts);
            }
        }
        ConnectedSince::Raw(value.to_string())
    }
}

impl fmt::Display for ConnectedSince {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectedSince::Timestamp(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            ConnectedSince::Raw(text) => write!(f, "{}", text),
        }
    }
}

impl Serialize for ConnectedSince {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One currently connected client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedClient {
    pub username: String,
    /// Remote IP with the port removed
    pub real_address: String,
    pub virtual_address: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub connected_since: ConnectedSince,
    pub raw_line: String,
}

/// Where a client listing came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "camelCase")]
pub enum ClientSource {
    StatusLog(PathBuf),
    Command,
    /// No log was readable and the command failed
    Unavailable,
}

/// Connected clients plus the source they were read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientListing {
    pub clients: Vec<ConnectedClient>,
    pub source: ClientSource,
}

impl ClientListing {
    pub fn count(&self) -> usize {
        self.clients.len()
    }
}

/// Column positions within a client record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StatusColumns {
    name: usize,
    real_address: usize,
    /// Version 1 rows carry no virtual address; it comes from the routing table
    virtual_address: Option<usize>,
    bytes_in: usize,
    bytes_out: usize,
    since: usize,
    since_epoch: Option<usize>,
}

impl Default for StatusColumns {
    fn default() -> Self {
        Self {
            name: 1,
            real_address: 2,
            virtual_address: Some(3),
            bytes_in: 4,
            bytes_out: 5,
            since: 6,
            since_epoch: None,
        }
    }
}

impl StatusColumns {
    /// Version 1 layout: `Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since`
    fn legacy() -> Self {
        Self {
            name: 0,
            real_address: 1,
            virtual_address: None,
            bytes_in: 2,
            bytes_out: 3,
            since: 4,
            since_epoch: None,
        }
    }

    /// Map a `HEADER,CLIENT_LIST,...` line; `None` when it lacks a name column
    fn from_header(fields: &[&str]) -> Option<Self> {
        // fields[0] is HEADER, fields[1] lines up with a record's CLIENT_LIST
        let names = fields.iter().enumerate().skip(1).map(|(i, name)| (i - 1, *name));
        Self::from_names(names, Self::default())
    }

    /// Map a version 1 `Common Name,Real Address,...` header row
    fn from_legacy_header(fields: &[&str]) -> Option<Self> {
        if !fields[0].trim().eq_ignore_ascii_case("common name") {
            return None;
        }
        Self::from_names(fields.iter().copied().enumerate(), Self::legacy())
    }

    fn from_names<'a>(names: impl Iterator<Item = (usize, &'a str)>, defaults: Self) -> Option<Self> {
        let positions: HashMap<String, usize> = names
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();
        let column = |name: &str, fallback: usize| positions.get(name).copied().unwrap_or(fallback);

        Some(Self {
            name: *positions.get("common name")?,
            real_address: column("real address", defaults.real_address),
            virtual_address: positions
                .get("virtual address")
                .copied()
                .or(defaults.virtual_address),
            bytes_in: column("bytes received", defaults.bytes_in),
            bytes_out: column("bytes sent", defaults.bytes_out),
            since: column("connected since", defaults.since),
            since_epoch: positions.get("connected since (time_t)").copied(),
        })
    }

    fn required_len(&self) -> usize {
        [
            self.name,
            self.real_address,
            self.virtual_address.unwrap_or(0),
            self.bytes_in,
            self.bytes_out,
            self.since,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

/// Column positions within a version 1 routing-table row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RouteColumns {
    virtual_address: usize,
    name: usize,
    real_address: usize,
}

impl RouteColumns {
    /// Map a `Virtual Address,Common Name,Real Address,Last Ref` header row
    fn from_header(fields: &[&str]) -> Option<Self> {
        let position = |wanted: &str| {
            fields
                .iter()
                .position(|f| f.trim().eq_ignore_ascii_case(wanted))
        };
        Some(Self {
            virtual_address: position("virtual address")?,
            name: position("common name")?,
            real_address: position("real address")?,
        })
    }

    /// `((name, real address without port), virtual address)`
    fn route(&self, fields: &[&str]) -> Option<((String, String), String)> {
        let virtual_address = fields.get(self.virtual_address)?.trim();
        let name = fields.get(self.name)?.trim();
        let real_address = fields.get(self.real_address)?.trim();
        if virtual_address.is_empty() {
            return None;
        }
        Some((
            (name.to_string(), strip_port(real_address)),
            virtual_address.to_string(),
        ))
    }
}

/// Parse sanitized status-log content.
///
/// Reads the comma-delimited formats:
/// - version 2 `CLIENT_LIST` records (optionally described by a `HEADER`
///   line), up to the `ROUTING_TABLE` or `GLOBAL_STATS` sentinel
/// - version 1 rows under a `Common Name,Real Address,...` header, with
///   virtual addresses joined in from the `ROUTING TABLE` section
///
/// Malformed byte counters become 0. Content in neither format yields an
/// empty list.
pub fn parse_status_log(content: &str) -> Vec<ConnectedClient> {
    parse_status_sections(content).unwrap_or_default()
}

/// Like [`parse_status_log`], but `None` when the content carries no
/// status-log marker at all
fn parse_status_sections(content: &str) -> Option<Vec<ConnectedClient>> {
    let mut clients = Vec::new();
    let mut recognised = false;
    let mut columns = StatusColumns::default();
    let mut legacy: Option<StatusColumns> = None;
    let mut in_routing = false;
    let mut route_columns: Option<RouteColumns> = None;
    let mut routes: HashMap<(String, String), String> = HashMap::new();

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if END_SENTINELS.iter().any(|s| line.starts_with(s)) {
            recognised = true;
            break;
        }
        if LEGACY_END_MARKERS.contains(&line) {
            break;
        }
        if line == LEGACY_TITLE {
            recognised = true;
            continue;
        }
        if line == LEGACY_ROUTING_MARKER {
            recognised = true;
            in_routing = true;
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();

        if in_routing {
            match route_columns {
                None => route_columns = RouteColumns::from_header(&fields),
                Some(ref cols) => {
                    if let Some((key, address)) = cols.route(&fields) {
                        routes.entry(key).or_insert(address);
                    }
                }
            }
            continue;
        }

        match fields[0] {
            HEADER_SENTINEL if fields.get(1) == Some(&CLIENT_LIST_SENTINEL) => {
                recognised = true;
                if let Some(mapped) = StatusColumns::from_header(&fields) {
                    columns = mapped;
                }
            }
            CLIENT_LIST_SENTINEL => {
                recognised = true;
                if let Some(client) = client_from_fields(line, &fields, &columns) {
                    clients.push(client);
                }
            }
            TITLE_SENTINEL => recognised = true,
            _ => {
                if let Some(mapped) = StatusColumns::from_legacy_header(&fields) {
                    recognised = true;
                    legacy = Some(mapped);
                } else if let Some(ref cols) = legacy {
                    if let Some(client) = client_from_fields(line, &fields, cols) {
                        clients.push(client);
                    }
                }
            }
        }
    }

    if !recognised {
        return None;
    }

    for client in clients.iter_mut().filter(|c| c.virtual_address.is_empty()) {
        let key = (client.username.clone(), client.real_address.clone());
        client.virtual_address = routes
            .get(&key)
            .cloned()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    }

    Some(clients)
}

fn client_from_fields(line: &str, fields: &[&str], columns: &StatusColumns) -> Option<ConnectedClient> {
    if fields.len() < columns.required_len() {
        return None;
    }

    let username = fields[columns.name].trim();
    if username == UNDEF_NAME || !is_valid_username(username) {
        return None;
    }

    let epoch = columns
        .since_epoch
        .and_then(|i| fields.get(i))
        .map(|value| ConnectedSince::parse(value))
        .filter(|since| matches!(since, ConnectedSince::Timestamp(_)));

    Some(ConnectedClient {
        username: username.to_string(),
        real_address: strip_port(fields[columns.real_address].trim()),
        virtual_address: columns
            .virtual_address
            .map(|i| fields[i].trim().to_string())
            .unwrap_or_default(),
        bytes_in: fields[columns.bytes_in].trim().parse().unwrap_or(0),
        bytes_out: fields[columns.bytes_out].trim().parse().unwrap_or(0),
        connected_since: epoch.unwrap_or_else(|| ConnectedSince::parse(fields[columns.since])),
        raw_line: line.to_string(),
    })
}

/// Parse the management tool's sanitized client table.
///
/// Columns are taken relative to the username column: remote address,
/// virtual address, bytes received, bytes sent, then the connection time
/// (all remaining tokens).
pub fn parse_client_table(text: &str, tool_name: &str) -> Vec<ConnectedClient> {
    let mut clients = Vec::new();
    let mut in_data_section = false;
    let mut name_index = 0;

    for raw in text.lines() {
        let line = raw.trim();

        if line.is_empty() || is_separator_line(line) {
            continue;
        }

        let header_allowed = !in_data_section && clients.is_empty();
        if let Some(header) = header_allowed
            .then(|| detect_header(line, &CLIENT_COLUMN_WORDS))
            .flatten()
        {
            in_data_section = true;
            name_index = header.name_index;
            continue;
        }

        if is_noise_line(line, tool_name) {
            continue;
        }

        let tokens = data_tokens(line);
        if !in_data_section && tokens.len() < 2 {
            continue;
        }

        let Some(username) = tokens.get(name_index).copied() else {
            continue;
        };
        if !is_valid_username(username) {
            continue;
        }

        let column = |offset: usize| tokens.get(name_index + offset).copied();
        let since = tokens
            .get(name_index + 5..)
            .map(|rest| rest.join(" "))
            .unwrap_or_default();

        clients.push(ConnectedClient {
            username: username.to_string(),
            real_address: column(1)
                .map(strip_port)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            virtual_address: column(2).unwrap_or(NOT_AVAILABLE).to_string(),
            bytes_in: column(3).map(parse_byte_count).unwrap_or(0),
            bytes_out: column(4).map(parse_byte_count).unwrap_or(0),
            connected_since: if since.is_empty() {
                ConnectedSince::Raw(NOT_AVAILABLE.to_string())
            } else {
                ConnectedSince::parse(&since)
            },
            raw_line: line.to_string(),
        });
    }

    clients
}

/// Integer or human-readable (`1.2MiB`, `345KB`, `10 B`) byte count; 0 when unreadable.
///
/// Unit prefixes are binary (K = 1024) with or without the `i`.
pub fn parse_byte_count(value: &str) -> u64 {
    let value = value.trim();
    if let Ok(bytes) = value.parse::<u64>() {
        return bytes;
    }

    let Some(captures) = byte_size_regex().captures(value) else {
        return 0;
    };
    let Ok(number) = captures[1].parse::<f64>() else {
        return 0;
    };
    let exponent = match captures[2].to_ascii_lowercase().as_str() {
        "k" => 1,
        "m" => 2,
        "g" => 3,
        "t" => 4,
        "p" => 5,
        _ => 0,
    };

    (number * 1024f64.powi(exponent)).round() as u64
}

/// `10.0.0.5:1194` -> `10.0.0.5`, `[2001:db8::1]:1194` -> `2001:db8::1`.
/// Bare IPv6 addresses are returned unchanged.
pub fn strip_port(address: &str) -> String {
    if let Some(rest) = address.strip_prefix('[') {
        if let Some((host, _)) = rest.split_once(']') {
            return host.to_string();
        }
    }

    match address.split_once(':') {
        Some((host, port)) if !port.contains(':') && !host.is_empty() => host.to_string(),
        _ => address.to_string(),
    }
}

/// Resolves the connected-client listing from the configured sources
pub struct ClientMonitor {
    runner: Arc<dyn CommandRunner>,
    config: AdminConfig,
    logger: Logger,
}

impl ClientMonitor {
    pub fn new(runner: Arc<dyn CommandRunner>, config: AdminConfig, logger: &Logger) -> Self {
        Self {
            runner,
            config,
            logger: logger.child("clients"),
        }
    }

    /// Status log first (priority order), then the tool's client table.
    ///
    /// Never fails: an unreadable everything yields an empty listing with
    /// [`ClientSource::Unavailable`].
    pub fn connected_clients(&self) -> ClientListing {
        for path in &self.config.status_log_paths {
            match self.read_status_log(path) {
                Ok(content) => {
                    let Some(clients) = parse_status_sections(&content) else {
                        self.logger.debug(format!(
                            "Status log {} has no recognisable client section",
                            path.display()
                        ));
                        continue;
                    };
                    self.logger.debug(format!(
                        "Read {} client(s) from {}",
                        clients.len(),
                        path.display()
                    ));
                    return ClientListing {
                        clients,
                        source: ClientSource::StatusLog(path.clone()),
                    };
                }
                Err(e) => {
                    self.logger
                        .debug(format!("Status log {} not usable: {}", path.display(), e));
                }
            }
        }

        let command = self.config.dialect.clients_command();
        let options = CommandOptions::from_config(&self.config);
        match self.runner.execute(&command, &options) {
            Ok(result) if result.success => ClientListing {
                clients: parse_client_table(&result.stdout, &self.config.dialect.program),
                source: ClientSource::Command,
            },
            Ok(result) => {
                self.logger.warn(format!(
                    "Client listing unavailable ({}): {}",
                    result.failure_kind,
                    result.error_text()
                ));
                Self::unavailable()
            }
            Err(e) => {
                self.logger.warn(format!("Client listing unavailable: {}", e));
                Self::unavailable()
            }
        }
    }

    /// Number of connected clients, 0 when the sources are unavailable
    pub fn connected_count(&self) -> usize {
        self.connected_clients().count()
    }

    fn read_status_log(&self, path: &Path) -> std::io::Result<String> {
        let mut bytes = Vec::new();
        File::open(path)?
            .take(self.config.max_output_bytes as u64)
            .read_to_end(&mut bytes)?;
        Ok(sanitize_bytes(&bytes))
    }

    fn unavailable() -> ClientListing {
        ClientListing {
            clients: Vec::new(),
            source: ClientSource::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_log_fixed_positions() {
        let content = "\
OpenVPN CLIENT LIST
Updated,2023-11-14 22:20:00
CLIENT_LIST,alice,10.0.0.5:1194,10.8.0.2,1000,2000,1700000000
CLIENT_LIST,UNDEF,10.0.0.9:1194,,0,0,1700000000
CLIENT_LIST,bad name,10.0.0.7:1194,10.8.0.4,1,2,1700000000
ROUTING_TABLE,10.8.0.2,alice,10.0.0.5:1194,1700000000
CLIENT_LIST,after,10.0.0.6:1194,10.8.0.3,1,2,1700000000
";
        let clients = parse_status_log(content);
        assert_eq!(clients.len(), 1);
        let alice = &clients[0];
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.real_address, "10.0.0.5");
        assert_eq!(alice.virtual_address, "10.8.0.2");
        assert_eq!(alice.bytes_in, 1000);
        assert_eq!(alice.bytes_out, 2000);
        assert_eq!(alice.connected_since.to_string(), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_parse_status_log_with_header() {
        let content = "\
TITLE,OpenVPN 2.5.1 x86_64-pc-linux-gnu
HEADER,CLIENT_LIST,Common Name,Real Address,Virtual Address,Virtual IPv6 Address,Bytes Received,Bytes Sent,Connected Since,Connected Since (time_t),Username,Client ID,Peer ID
CLIENT_LIST,bob,[2001:db8::1]:51000,10.8.0.6,,4096,8192,2023-11-14 22:13:20,1700000000,UNDEF,3,0
GLOBAL_STATS,Max bcast/mcast queue length,0
";
        let clients = parse_status_log(content);
        assert_eq!(clients.len(), 1);
        let bob = &clients[0];
        assert_eq!(bob.real_address, "2001:db8::1");
        assert_eq!(bob.virtual_address, "10.8.0.6");
        assert_eq!(bob.bytes_in, 4096);
        assert_eq!(bob.bytes_out, 8192);
        assert_eq!(
            bob.connected_since,
            ConnectedSince::Timestamp(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_version_one_log() {
        let content = "\
OpenVPN CLIENT LIST
Updated,Tue Nov 14 22:20:00 2023
Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since
alice,10.0.0.5:1194,1000,2000,Tue Nov 14 22:13:20 2023
UNDEF,10.0.0.9:1194,0,0,Tue Nov 14 22:14:00 2023
dave,192.0.2.8:40000,7,8,Tue Nov 14 22:15:00 2023
ROUTING TABLE
Virtual Address,Common Name,Real Address,Last Ref
10.8.0.2,alice,10.0.0.5:1194,Tue Nov 14 22:19:00 2023
GLOBAL STATS
Max bcast/mcast queue length,0
END
";
        let clients = parse_status_log(content);
        assert_eq!(clients.len(), 2);

        let alice = &clients[0];
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.real_address, "10.0.0.5");
        assert_eq!(alice.virtual_address, "10.8.0.2");
        assert_eq!(alice.bytes_in, 1000);
        assert_eq!(alice.bytes_out, 2000);
        assert_eq!(
            alice.connected_since,
            ConnectedSince::Raw("Tue Nov 14 22:13:20 2023".to_string())
        );

        // No routing entry for dave
        assert_eq!(clients[1].username, "dave");
        assert_eq!(clients[1].virtual_address, "N/A");
    }

    #[test]
    fn test_version_one_rows_before_header_ignored() {
        let content = "\
OpenVPN CLIENT LIST
erin,10.0.0.5:1194,1,2,Tue Nov 14 22:13:20 2023
";
        assert!(parse_status_log(content).is_empty());
        assert_eq!(parse_status_sections(content), Some(Vec::new()));
    }

    #[test]
    fn test_unrecognised_content_has_no_sections() {
        assert_eq!(parse_status_sections("just some text\nalice,1,2\n"), None);
        assert_eq!(parse_status_sections(""), None);
        assert!(parse_status_log("just some text\n").is_empty());
    }

    #[test]
    fn test_malformed_counters_default_to_zero() {
        let clients = parse_status_log("CLIENT_LIST,carol,1.2.3.4:5,10.8.0.9,abc,,Tue Nov 14 22:13:20 2023\n");
        assert_eq!(clients[0].bytes_in, 0);
        assert_eq!(clients[0].bytes_out, 0);
        assert_eq!(
            clients[0].connected_since,
            ConnectedSince::Raw("Tue Nov 14 22:13:20 2023".to_string())
        );
    }

    #[test]
    fn test_short_record_skipped() {
        assert!(parse_status_log("CLIENT_LIST,alice,1.2.3.4:5\n").is_empty());
    }

    #[test]
    fn test_parse_client_table() {
        let text = "\
: NOTE : The output below is NOT real-time!
:      : It may be off by a few minutes.

::: Client Status List :::
Name      Remote IP           Virtual IP    Bytes Received   Bytes Sent   Connected Since
alice     203.0.113.7:51820   10.8.0.2      1.5KiB           2MiB         Nov 14 2023 - 22:13:20
bob       198.51.100.4:1194   10.8.0.3      512              junk         Nov 14 2023 - 23:00:01

::: Disabled clients :::
";
        let clients = parse_client_table(text, "pivpn");
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].username, "alice");
        assert_eq!(clients[0].real_address, "203.0.113.7");
        assert_eq!(clients[0].virtual_address, "10.8.0.2");
        assert_eq!(clients[0].bytes_in, 1536);
        assert_eq!(clients[0].bytes_out, 2 * 1024 * 1024);
        assert_eq!(clients[0].connected_since.to_string(), "Nov 14 2023 22:13:20");
        assert_eq!(clients[1].bytes_in, 512);
        assert_eq!(clients[1].bytes_out, 0);
    }

    #[test]
    fn test_client_table_header_like_row_is_data() {
        let text = "\
Name      Remote IP           Virtual IP    Bytes Received   Bytes Sent   Connected Since
client    remote-host         virtual-host  bytes            bytes        since
alice     203.0.113.7:51820   10.8.0.2      1                2            Nov 14 2023
";
        let clients = parse_client_table(text, "pivpn");
        let names: Vec<&str> = clients.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, vec!["client", "alice"]);
        assert_eq!(clients[0].real_address, "remote-host");
        assert_eq!(clients[1].real_address, "203.0.113.7");
    }

    #[test]
    fn test_parse_byte_count() {
        assert_eq!(parse_byte_count("1000"), 1000);
        assert_eq!(parse_byte_count("10 B"), 10);
        assert_eq!(parse_byte_count("345KB"), 345 * 1024);
        assert_eq!(parse_byte_count("1.2MiB"), 1_258_291);
        assert_eq!(parse_byte_count("N/A"), 0);
        assert_eq!(parse_byte_count(""), 0);
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("10.0.0.5:1194"), "10.0.0.5");
        assert_eq!(strip_port("10.0.0.5"), "10.0.0.5");
        assert_eq!(strip_port("[::1]:1194"), "::1");
        assert_eq!(strip_port("2001:db8::1"), "2001:db8::1");
    }

    #[test]
    fn test_connected_since_serializes_as_string() {
        let since = ConnectedSince::parse("1700000000");
        assert_eq!(
            serde_json::to_string(&since).unwrap(),
            "\"2023-11-14T22:13:20Z\""
        );
        let raw = ConnectedSince::parse("yesterday");
        assert_eq!(serde_json::to_string(&raw).unwrap(), "\"yesterday\"");
    }
}
