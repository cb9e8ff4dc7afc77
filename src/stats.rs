//! Lock-free sweep statistics.
//!
//! Six monotonic counters plus the start timestamp. All mutations are atomic
//! increments; reads never lock. A periodic reporter task emits a one-line
//! snapshot while the sweep runs, and a final summary is printed at the end.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Counters for one sweep run.
pub struct Stats {
    total_domains: AtomicU64,
    processed_queries: AtomicU64,
    successful_queries: AtomicU64,
    error_queries: AtomicU64,
    no_answer_queries: AtomicU64,
    wildcard_queries: AtomicU64,
    start_time: Instant,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    /// Creates a zeroed tracker stamped with the current time.
    pub fn new() -> Self {
        Stats {
            total_domains: AtomicU64::new(0),
            processed_queries: AtomicU64::new(0),
            successful_queries: AtomicU64::new(0),
            error_queries: AtomicU64::new(0),
            no_answer_queries: AtomicU64::new(0),
            wildcard_queries: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Counts one ingested domain.
    pub fn increment_total(&self) {
        self.total_domains.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one consumed query result.
    pub fn increment_processed(&self) {
        self.processed_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one answered, non-suppressed query.
    pub fn increment_successful(&self) {
        self.successful_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one query that exhausted its attempts.
    pub fn increment_errors(&self) {
        self.error_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one response with an empty answer section.
    pub fn increment_no_answer(&self) {
        self.no_answer_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one wildcard-suppressed result.
    pub fn increment_wildcards(&self) {
        self.wildcard_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Total ingested domains.
    pub fn total(&self) -> u64 {
        self.total_domains.load(Ordering::Relaxed)
    }

    /// Total consumed query results.
    pub fn processed(&self) -> u64 {
        self.processed_queries.load(Ordering::Relaxed)
    }

    /// Answered, non-suppressed queries.
    pub fn successful(&self) -> u64 {
        self.successful_queries.load(Ordering::Relaxed)
    }

    /// Queries that exhausted their attempts.
    pub fn errors(&self) -> u64 {
        self.error_queries.load(Ordering::Relaxed)
    }

    /// Responses with empty answer sections.
    pub fn no_answer(&self) -> u64 {
        self.no_answer_queries.load(Ordering::Relaxed)
    }

    /// Wildcard-suppressed results.
    pub fn wildcards(&self) -> u64 {
        self.wildcard_queries.load(Ordering::Relaxed)
    }

    /// Wall time since the tracker was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Mean processed queries per second since start.
    pub fn queries_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.processed() as f64 / elapsed
    }

    /// Logs a one-line snapshot of the current counters.
    pub fn log_current(&self) {
        info!(
            "Stats: total={}, processed={}, successful={}, errors={}, no_answer={}, wildcards={}, elapsed={:.0?}, qps={:.2}",
            self.total(),
            self.processed(),
            self.successful(),
            self.errors(),
            self.no_answer(),
            self.wildcards(),
            self.elapsed(),
            self.queries_per_second()
        );
    }

    /// Logs the final multi-line summary.
    pub fn log_final(&self) {
        let processed = self.processed();

        info!("=== Final Statistics ===");
        info!("Total domains processed: {}", self.total());
        info!("Total queries sent: {processed}");
        info!(
            "Successful queries: {} ({:.2}%)",
            self.successful(),
            percentage(self.successful(), processed)
        );
        info!(
            "Failed queries: {} ({:.2}%)",
            self.errors(),
            percentage(self.errors(), processed)
        );
        info!(
            "No answer queries: {} ({:.2}%)",
            self.no_answer(),
            percentage(self.no_answer(), processed)
        );
        info!(
            "Wildcard queries: {} ({:.2}%)",
            self.wildcards(),
            percentage(self.wildcards(), processed)
        );
        info!("Total elapsed time: {:.1?}", self.elapsed());
        info!("Average queries per second: {:.2}", self.queries_per_second());
    }

    /// Spawns the periodic reporter task.
    ///
    /// Emits [`Stats::log_current`] every `period` until `cancel` fires. The
    /// returned handle completes once the task observes cancellation.
    pub fn start_reporter(
        self: &Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let stats = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick fires immediately; skip it so the first report
            // lands one full period into the run.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => stats.log_current(),
                    () = cancel.cancelled() => break,
                }
            }
        })
    }
}

/// Percentage with zero-division protection.
fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
