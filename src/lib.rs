//! dnsweep library: high-throughput bulk DNS resolution.
//!
//! Given a stream of candidate names and a list of record types, dnsweep
//! issues recursive queries against a pool of upstream resolvers, filters
//! out answers produced by wildcard zones, and emits one structured record
//! per resolved resource record.
//!
//! # Example
//!
//! ```no_run
//! use dnsweep::{run_sweep, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     input: Some(std::path::PathBuf::from("domains.txt")),
//!     qps: 200,
//!     wildcard_detection: true,
//!     ..Default::default()
//! };
//!
//! let report = run_sweep(config).await?;
//! println!(
//!     "Resolved {} of {} queries ({} wildcard-suppressed)",
//!     report.successful, report.processed, report.wildcard_suppressed
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

pub mod config;
pub mod initialization;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod rate_limiter;
pub mod resolver;
pub mod stats;
pub mod wildcard;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel, Opt, OutputFormat};
pub use output::{OutputHandler, OutputRecord};
pub use pipeline::{run_sweep, run_sweep_with_cancel, SweepReport};
pub use rate_limiter::QueryRateLimiter;
pub use resolver::{QueryResult, ResolverEndpoint, ResolverPool};
pub use stats::Stats;
pub use wildcard::WildcardDetector;
