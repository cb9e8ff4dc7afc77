//! Application configuration and CLI options.
//!
//! This module provides:
//! - Configuration constants (defaults for qps, timeout, retries, workers)
//! - The clap-derived CLI surface (`Opt`)
//! - The library configuration struct (`Config`, no CLI dependencies)
//! - Query-type list parsing

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use hickory_proto::rr::RecordType;

/// Default aggregate query rate (queries per second).
pub const DEFAULT_QPS: u32 = 100;
/// Default per-attempt timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 3;
/// Default number of worker tasks.
pub const DEFAULT_WORKERS: usize = 50;

/// Logging level for the application.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Output format for resolved records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated `domain  type  value  ttl` lines
    Simple,
    /// One JSON object per resource record per line
    Json,
    /// CSV with a single header row
    Csv,
}

/// Errors raised while turning CLI options into a [`Config`].
#[derive(Debug)]
pub enum ConfigError {
    /// A query-type token was neither a known name nor a numeric type.
    UnknownQueryType(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::UnknownQueryType(t) => write!(f, "unknown query type: {t}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Command-line options.
#[derive(Debug, Parser)]
#[command(
    name = "dnsweep",
    version,
    about = "High-throughput bulk DNS resolver with wildcard filtering",
    after_help = "Examples:\n  \
        echo 'google.com' | dnsweep\n  \
        dnsweep -i domains.txt -o results.txt -t A,AAAA --qps 50\n  \
        dnsweep -r 8.8.8.8,1.1.1.1 -w -v\n  \
        dnsweep --resolvers-file resolvers.txt -f json --timeout 10"
)]
pub struct Opt {
    /// Input file containing DNS names (default: stdin)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for results (default: stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Log file for errors and debug info (default: stderr)
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Comma-separated list of DNS resolver addresses
    #[arg(short = 'r', long = "resolvers")]
    pub resolvers: Option<String>,

    /// File containing DNS resolver addresses, one per line
    #[arg(long = "resolvers-file")]
    pub resolvers_file: Option<PathBuf>,

    /// Comma-separated list of DNS record types (A,AAAA,CNAME,MX,NS,TXT,SOA,PTR,SRV or numeric)
    #[arg(short = 't', long = "query-types", default_value = "A")]
    pub query_types: String,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Simple)]
    pub format: OutputFormat,

    /// Aggregate queries per second across all workers
    #[arg(long = "qps", default_value_t = DEFAULT_QPS)]
    pub qps: u32,

    /// Query timeout in seconds
    #[arg(long = "timeout", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Number of retries for failed queries
    #[arg(long = "retries", default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// Number of worker tasks
    #[arg(long = "workers", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Enable DNS wildcard detection
    #[arg(short = 'w', long = "wildcard-detection")]
    pub wildcard_detection: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (suppress non-essential output)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

/// Library configuration (no CLI dependencies).
///
/// This is the core configuration struct used by [`crate::run_sweep`]. It can
/// be constructed programmatically without going through the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Input file, `None` for stdin
    pub input: Option<PathBuf>,

    /// Output file, `None` for stdout
    pub output: Option<PathBuf>,

    /// Inline comma-separated resolver addresses
    pub resolvers: Option<String>,

    /// File of resolver addresses, one per line
    pub resolvers_file: Option<PathBuf>,

    /// Record types to query for each domain, in order
    pub query_types: Vec<RecordType>,

    /// Output format
    pub format: OutputFormat,

    /// Aggregate queries per second across all workers
    pub qps: u32,

    /// Per-attempt timeout
    pub timeout: Duration,

    /// Retries after the first attempt per (domain, type)
    pub retries: u32,

    /// Number of worker tasks
    pub workers: usize,

    /// Enable wildcard detection
    pub wildcard_detection: bool,

    /// Verbose per-attempt logging
    pub verbose: bool,

    /// Suppress the periodic stats reporter
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: None,
            output: None,
            resolvers: None,
            resolvers_file: None,
            query_types: vec![RecordType::A],
            format: OutputFormat::Simple,
            qps: DEFAULT_QPS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
            workers: DEFAULT_WORKERS,
            wildcard_detection: false,
            verbose: false,
            quiet: false,
        }
    }
}

impl Config {
    /// Builds a `Config` from parsed CLI options.
    ///
    /// Query types are parsed here so that a bad `-t` value fails before any
    /// network activity. Zero-valued performance knobs fall back to their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownQueryType`] for an unrecognized `-t`
    /// token.
    pub fn from_opt(opt: &Opt) -> Result<Self, ConfigError> {
        let query_types = parse_query_types(&opt.query_types)?;

        Ok(Config {
            input: opt.input.clone(),
            output: opt.output.clone(),
            resolvers: opt.resolvers.clone(),
            resolvers_file: opt.resolvers_file.clone(),
            query_types,
            format: opt.format,
            qps: if opt.qps == 0 { DEFAULT_QPS } else { opt.qps },
            timeout: Duration::from_secs(if opt.timeout == 0 {
                DEFAULT_TIMEOUT_SECS
            } else {
                opt.timeout
            }),
            retries: opt.retries,
            workers: if opt.workers == 0 {
                DEFAULT_WORKERS
            } else {
                opt.workers
            },
            wildcard_detection: opt.wildcard_detection,
            verbose: opt.verbose,
            quiet: opt.quiet,
        })
    }
}

/// Parses a comma-separated, case-insensitive query-type list.
///
/// Accepts the fixed name set A, AAAA, CNAME, MX, NS, TXT, SOA, PTR, SRV, or
/// a decimal record-type number in `(0, 65536)`. An empty list defaults to
/// `[A]`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownQueryType`] for any other token.
pub fn parse_query_types(list: &str) -> Result<Vec<RecordType>, ConfigError> {
    let mut types = Vec::new();

    for token in list.to_uppercase().split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let rtype = match token {
            "A" => RecordType::A,
            "AAAA" => RecordType::AAAA,
            "CNAME" => RecordType::CNAME,
            "MX" => RecordType::MX,
            "NS" => RecordType::NS,
            "TXT" => RecordType::TXT,
            "SOA" => RecordType::SOA,
            "PTR" => RecordType::PTR,
            "SRV" => RecordType::SRV,
            other => match other.parse::<u32>() {
                Ok(num) if num > 0 && num < 65536 => RecordType::from(num as u16),
                _ => return Err(ConfigError::UnknownQueryType(other.to_string())),
            },
        };
        types.push(rtype);
    }

    if types.is_empty() {
        return Ok(vec![RecordType::A]);
    }

    Ok(types)
}

/// Returns the built-in list of well-known public recursors.
///
/// Used when neither `-r` nor `--resolvers-file` yields any address.
pub fn default_resolvers() -> Vec<String> {
    [
        "8.8.8.8:53",         // Google DNS
        "8.8.4.4:53",         // Google DNS
        "1.1.1.1:53",         // Cloudflare DNS
        "1.0.0.1:53",         // Cloudflare DNS
        "9.9.9.9:53",         // Quad9 DNS
        "149.112.112.112:53", // Quad9 DNS
        "208.67.222.222:53",  // OpenDNS
        "208.67.220.220:53",  // OpenDNS
        "84.200.69.80:53",    // DNS.WATCH
        "84.200.70.40:53",    // DNS.WATCH
        "76.76.19.19:53",     // Alternate DNS
        "76.76.2.0:53",       // Alternate DNS
        "94.140.14.14:53",    // AdGuard DNS
        "94.140.15.15:53",    // AdGuard DNS
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
