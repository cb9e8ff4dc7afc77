//! Result formatting and serialized output writing.
//!
//! One output record is emitted per resource record in a successful
//! response's answer section. The handler serializes writes behind a mutex
//! so row framing is never interleaved across workers. Write failures are
//! logged and the sweep continues.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use hickory_proto::rr::{RData, Record, RecordType};
use log::error;
use serde::Serialize;

use crate::config::OutputFormat;
use crate::resolver::QueryResult;

/// A single resolved resource record, ready for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutputRecord {
    /// The domain as queried.
    pub domain: String,
    /// Queried type name (`A`, `AAAA`, ..., or `TYPE<n>`).
    #[serde(rename = "type")]
    pub type_name: String,
    /// Owner name from the resource record.
    pub record: String,
    /// Rendered record value; format depends on the type.
    pub value: String,
    /// Record time-to-live in seconds.
    pub ttl: u32,
    /// Address of the upstream that answered.
    pub resolver: String,
}

enum Sink {
    Simple(Box<dyn Write + Send>),
    Json(Box<dyn Write + Send>),
    Csv(csv::Writer<Box<dyn Write + Send>>),
}

/// Serialized writer for resolved records.
pub struct OutputHandler {
    sink: Mutex<Sink>,
}

impl OutputHandler {
    /// Opens the configured output destination: a file when `path` is given,
    /// stdout otherwise.
    ///
    /// # Errors
    ///
    /// Fails when the output file cannot be created; this is fatal at
    /// startup.
    pub fn new(path: Option<&Path>, format: OutputFormat) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match path {
            Some(p) => Box::new(
                File::create(p)
                    .with_context(|| format!("Failed to create output file: {}", p.display()))?,
            ),
            None => Box::new(io::stdout()),
        };
        Self::from_writer(writer, format)
    }

    /// Wraps an arbitrary writer. The CSV header row is written immediately.
    ///
    /// # Errors
    ///
    /// Fails when the CSV header cannot be written.
    pub fn from_writer(writer: Box<dyn Write + Send>, format: OutputFormat) -> Result<Self> {
        let sink = match format {
            OutputFormat::Simple => Sink::Simple(writer),
            OutputFormat::Json => Sink::Json(writer),
            OutputFormat::Csv => {
                let mut csv_writer = csv::Writer::from_writer(writer);
                csv_writer
                    .write_record(["Domain", "Type", "Record", "Value", "TTL", "Resolver"])
                    .context("Failed to write CSV header")?;
                csv_writer.flush().context("Failed to flush CSV header")?;
                Sink::Csv(csv_writer)
            }
        };

        Ok(OutputHandler {
            sink: Mutex::new(sink),
        })
    }

    /// Writes every answer record of a successful result.
    ///
    /// Results without answers are ignored here; the pipeline classifies
    /// them before calling. Write errors are logged, never propagated.
    pub fn write_result(&self, result: &QueryResult) {
        let records = extract_records(result);
        if records.is_empty() {
            return;
        }

        let mut sink = self.sink.lock().expect("output lock poisoned");
        if let Err(e) = write_records(&mut sink, &records) {
            error!("Failed to write output records: {e:#}");
        }
    }

    /// Flushes buffered output.
    pub fn flush(&self) {
        let mut sink = self.sink.lock().expect("output lock poisoned");
        let result = match &mut *sink {
            Sink::Simple(w) | Sink::Json(w) => w.flush(),
            Sink::Csv(w) => w.flush(),
        };
        if let Err(e) = result {
            error!("Failed to flush output: {e}");
        }
    }
}

fn write_records(sink: &mut Sink, records: &[OutputRecord]) -> Result<()> {
    match sink {
        Sink::Simple(w) => {
            for r in records {
                writeln!(w, "{}\t{}\t{}\t{}", r.domain, r.type_name, r.value, r.ttl)?;
            }
        }
        Sink::Json(w) => {
            for r in records {
                let line = serde_json::to_string(r)?;
                writeln!(w, "{line}")?;
            }
        }
        Sink::Csv(w) => {
            for r in records {
                w.write_record([
                    r.domain.as_str(),
                    r.type_name.as_str(),
                    r.record.as_str(),
                    r.value.as_str(),
                    r.ttl.to_string().as_str(),
                    r.resolver.as_str(),
                ])?;
            }
            w.flush()?;
        }
    }
    Ok(())
}

/// Extracts one output record per answer RR of a successful result.
pub fn extract_records(result: &QueryResult) -> Vec<OutputRecord> {
    let QueryResult::Success {
        domain,
        record_type,
        response,
        resolver,
    } = result
    else {
        return Vec::new();
    };

    response
        .answers()
        .iter()
        .map(|rr| OutputRecord {
            domain: domain.clone(),
            type_name: record_type_label(*record_type),
            record: rr.name().to_utf8(),
            value: render_value(rr),
            ttl: rr.ttl(),
            resolver: resolver.to_string(),
        })
        .collect()
}

/// Presentation name for a record type.
///
/// Types outside the queryable name set use the RFC 3597 `TYPE<n>` form.
pub fn record_type_label(record_type: RecordType) -> String {
    match record_type {
        RecordType::A => "A".to_string(),
        RecordType::AAAA => "AAAA".to_string(),
        RecordType::CNAME => "CNAME".to_string(),
        RecordType::MX => "MX".to_string(),
        RecordType::NS => "NS".to_string(),
        RecordType::TXT => "TXT".to_string(),
        RecordType::SOA => "SOA".to_string(),
        RecordType::PTR => "PTR".to_string(),
        RecordType::SRV => "SRV".to_string(),
        other => format!("TYPE{}", u16::from(other)),
    }
}

/// Renders a resource record's value in the per-type output form.
pub fn render_value(record: &Record) -> String {
    match record.data() {
        RData::A(a) => a.0.to_string(),
        RData::AAAA(aaaa) => aaaa.0.to_string(),
        RData::CNAME(cname) => cname.0.to_utf8(),
        RData::MX(mx) => format!("{} {}", mx.preference(), mx.exchange().to_utf8()),
        RData::NS(ns) => ns.0.to_utf8(),
        RData::TXT(txt) => txt
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect::<Vec<_>>()
            .join(" "),
        RData::SOA(soa) => format!(
            "{} {} {} {} {} {} {}",
            soa.mname().to_utf8(),
            soa.rname().to_utf8(),
            soa.serial(),
            soa.refresh(),
            soa.retry(),
            soa.expire(),
            soa.minimum()
        ),
        RData::PTR(ptr) => ptr.0.to_utf8(),
        RData::SRV(srv) => format!(
            "{} {} {} {}",
            srv.priority(),
            srv.weight(),
            srv.port(),
            srv.target().to_utf8()
        ),
        other => other.to_string(),
    }
}
