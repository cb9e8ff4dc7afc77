//! Input reading and domain syntax validation.
//!
//! Candidate names arrive one per line. Lines are trimmed; blank lines and
//! `#` comments are skipped; lines that do not look like a domain name or an
//! IP address are dropped with a warning. The pipeline consumes whatever this
//! module yields without further syntax checks.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use regex::Regex;

/// Validates candidate input lines as domain names or IP addresses.
pub struct DomainValidator {
    domain_regex: Regex,
    ipv4_regex: Regex,
    ipv6_regex: Regex,
}

impl Default for DomainValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainValidator {
    /// Compiles the validation patterns.
    pub fn new() -> Self {
        DomainValidator {
            domain_regex: Regex::new(
                r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?)*$",
            )
            .unwrap(),
            ipv4_regex: Regex::new(
                r"^((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
            )
            .unwrap(),
            ipv6_regex: Regex::new(
                r"^([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}$|^::$|^::1$|^([0-9a-fA-F]{1,4}:){1,7}:$|^([0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}$|^([0-9a-fA-F]{1,4}:){1,5}(:[0-9a-fA-F]{1,4}){1,2}$|^([0-9a-fA-F]{1,4}:){1,4}(:[0-9a-fA-F]{1,4}){1,3}$|^([0-9a-fA-F]{1,4}:){1,3}(:[0-9a-fA-F]{1,4}){1,4}$|^([0-9a-fA-F]{1,4}:){1,2}(:[0-9a-fA-F]{1,4}){1,5}$|^[0-9a-fA-F]{1,4}:((:[0-9a-fA-F]{1,4}){1,6})$",
            )
            .unwrap(),
        }
    }

    /// Checks whether `input` is a syntactically valid domain name or IP
    /// address.
    ///
    /// Tolerates `http(s)://` prefixes, paths, and `host:port` forms by
    /// stripping them before validation, so copy-pasted URLs still pass.
    pub fn is_valid(&self, input: &str) -> bool {
        let mut input = input
            .strip_prefix("http://")
            .or_else(|| input.strip_prefix("https://"))
            .unwrap_or(input);

        if let Some(idx) = input.find('/') {
            input = &input[..idx];
        }

        // host:port, but not a bare IPv6 address
        if let Some((host, port)) = input.rsplit_once(':') {
            if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() {
                input = host;
            }
        }

        if self.ipv4_regex.is_match(input) || self.ipv6_regex.is_match(input) {
            return true;
        }

        if input.len() > 253 {
            return false;
        }

        self.domain_regex.is_match(input) && input.split('.').all(|label| label.len() <= 63)
    }
}

/// Line-oriented reader of candidate domains.
///
/// Wraps any [`BufRead`] source and yields trimmed, validated lines.
pub struct InputReader<R: BufRead> {
    reader: R,
    validator: DomainValidator,
    line_num: usize,
}

impl<R: BufRead> InputReader<R> {
    /// Creates a reader over an arbitrary buffered source.
    pub fn new(reader: R) -> Self {
        InputReader {
            reader,
            validator: DomainValidator::new(),
            line_num: 0,
        }
    }

    /// Returns the next candidate domain, or `None` at end of input.
    ///
    /// Blank lines and `#` comments are skipped silently; syntactically
    /// invalid lines are skipped with a warning carrying the line number.
    /// Read errors end the stream with a warning.
    pub fn next_domain(&mut self) -> Option<String> {
        loop {
            let mut line = String::new();
            self.line_num += 1;

            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read line {} from input: {e}", self.line_num);
                    return None;
                }
            }

            let candidate = line.trim();
            if candidate.is_empty() || candidate.starts_with('#') {
                continue;
            }

            if !self.validator.is_valid(candidate) {
                warn!("Invalid domain/IP on line {}: {candidate}", self.line_num);
                continue;
            }

            return Some(candidate.to_string());
        }
    }
}

/// Opens the configured input source: a file when `path` is given, stdin
/// otherwise.
///
/// # Errors
///
/// Fails when the input file cannot be opened.
pub fn open_input(path: Option<&Path>) -> Result<InputReader<Box<dyn BufRead + Send>>> {
    let reader: Box<dyn BufRead + Send> = match path {
        Some(p) => {
            let file = File::open(p)
                .with_context(|| format!("Failed to open input file: {}", p.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    Ok(InputReader::new(reader))
}
