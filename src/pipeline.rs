//! The concurrent resolution pipeline.
//!
//! Domains flow from the input reader through a bounded queue to a pool of
//! worker tasks, which fan each domain out across the configured record
//! types and push results onto a second bounded queue. A single result
//! processor classifies results, consults the wildcard detector, and feeds
//! the output handler. Shutdown is barrier-based: closing the domain queue
//! drains the workers, and the result queue closes itself once the last
//! worker's sender drops.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hickory_proto::rr::RecordType;
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::input;
use crate::output::OutputHandler;
use crate::rate_limiter::QueryRateLimiter;
use crate::resolver::{resolve_with_retries, QueryResult, ResolverPool};
use crate::stats::Stats;
use crate::wildcard::WildcardDetector;

/// Interval between periodic stats reports.
const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Final counters for one sweep run.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    /// Domains ingested.
    pub total: u64,
    /// Query results consumed.
    pub processed: u64,
    /// Answered, non-suppressed queries.
    pub successful: u64,
    /// Queries that exhausted their attempts.
    pub errors: u64,
    /// Responses with empty answer sections.
    pub no_answer: u64,
    /// Wildcard-suppressed results.
    pub wildcard_suppressed: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// Whether the run was cut short by cancellation.
    pub cancelled: bool,
}

/// Runs a sweep to completion with an internally owned cancellation token.
///
/// Library entry point for embedders that do not need signal handling.
///
/// # Errors
///
/// Fails on startup errors (unreadable input, unwritable output). Per-query
/// errors never surface here; they are counted in the report.
pub async fn run_sweep(config: Config) -> Result<SweepReport> {
    run_sweep_with_cancel(config, CancellationToken::new()).await
}

/// Runs a sweep, observing an externally driven cancellation token.
///
/// The CLI wires `cancel` to SIGINT/SIGTERM. On cancellation the ingester
/// stops, workers abandon in-progress waits, the result processor exits,
/// and the counters collected so far are returned with `cancelled` set.
///
/// # Errors
///
/// Fails on startup errors only, before any worker is spawned.
pub async fn run_sweep_with_cancel(
    config: Config,
    cancel: CancellationToken,
) -> Result<SweepReport> {
    // Fatal-at-startup resources come first, before anything is spawned.
    let mut reader =
        input::open_input(config.input.as_deref()).context("Failed to set up input reader")?;
    let output = Arc::new(
        OutputHandler::new(config.output.as_deref(), config.format)
            .context("Failed to set up output handler")?,
    );

    let pool = Arc::new(ResolverPool::new(&config).await);
    let rate_limiter = Arc::new(QueryRateLimiter::new(config.qps));
    let detector = config
        .wildcard_detection
        .then(|| Arc::new(WildcardDetector::new(Arc::clone(&pool))));
    let stats = Arc::new(Stats::new());

    let (domain_tx, domain_rx) = mpsc::channel::<String>(config.workers);
    let (result_tx, result_rx) = mpsc::channel::<QueryResult>(config.workers * 2);
    let domain_rx = Arc::new(Mutex::new(domain_rx));

    let query_types: Arc<[RecordType]> = Arc::from(config.query_types.as_slice());

    let mut workers = Vec::with_capacity(config.workers);
    for _ in 0..config.workers {
        workers.push(tokio::spawn(worker_loop(WorkerContext {
            domain_rx: Arc::clone(&domain_rx),
            result_tx: result_tx.clone(),
            query_types: Arc::clone(&query_types),
            pool: Arc::clone(&pool),
            rate_limiter: Arc::clone(&rate_limiter),
            retries: config.retries,
            cancel: cancel.clone(),
        })));
    }
    // Workers hold the only remaining senders; the result queue closes when
    // the last worker exits.
    drop(result_tx);

    let processor = tokio::spawn(process_results(
        result_rx,
        Arc::clone(&output),
        detector.clone(),
        Arc::clone(&stats),
        cancel.clone(),
    ));

    let reporter_cancel = cancel.child_token();
    let reporter = (config.verbose && !config.quiet)
        .then(|| stats.start_reporter(REPORT_INTERVAL, reporter_cancel.clone()));

    // Ingestion: one producer feeding the worker fan-out. Cancellation is
    // checked first so a fired token aborts ingestion even when the queue
    // still has room.
    while let Some(domain) = reader.next_domain() {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = domain_tx.send(domain) => {
                if sent.is_err() {
                    break;
                }
                stats.increment_total();
            }
        }
    }
    drop(domain_tx);

    if !cancel.is_cancelled() {
        info!("Waiting for workers to complete...");
    }

    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Worker task failed: {e}");
        }
    }
    if let Err(e) = processor.await {
        warn!("Result processor task failed: {e}");
    }

    reporter_cancel.cancel();
    if let Some(reporter) = reporter {
        let _ = reporter.await;
    }

    output.flush();
    pool.close();
    stats.log_final();

    Ok(SweepReport {
        total: stats.total(),
        processed: stats.processed(),
        successful: stats.successful(),
        errors: stats.errors(),
        no_answer: stats.no_answer(),
        wildcard_suppressed: stats.wildcards(),
        elapsed: stats.elapsed(),
        cancelled: cancel.is_cancelled(),
    })
}

struct WorkerContext {
    domain_rx: Arc<Mutex<mpsc::Receiver<String>>>,
    result_tx: mpsc::Sender<QueryResult>,
    query_types: Arc<[RecordType]>,
    pool: Arc<ResolverPool>,
    rate_limiter: Arc<QueryRateLimiter>,
    retries: u32,
    cancel: CancellationToken,
}

/// One worker task: pull a domain, fan out across record types, push
/// results.
///
/// Queries for one domain are issued in the configured record-type order.
/// Every suspension point observes cancellation.
async fn worker_loop(ctx: WorkerContext) {
    loop {
        let next = {
            let mut rx = ctx.domain_rx.lock().await;
            tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => return,
                maybe = rx.recv() => maybe,
            }
        };
        let Some(domain) = next else {
            // Domain queue closed and drained.
            return;
        };

        for &record_type in ctx.query_types.iter() {
            if !ctx.rate_limiter.wait(&ctx.cancel).await {
                return;
            }

            let result = tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => return,
                result = resolve_with_retries(&ctx.pool, &domain, record_type, ctx.retries) => result,
            };

            tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => return,
                sent = ctx.result_tx.send(result) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// The single result consumer: classify, suppress wildcards, write output,
/// count.
///
/// `processed` is incremented exactly once per received result, before
/// classification, so the counter identity
/// `successful + errors + no_answer + wildcards == processed` holds at every
/// point in time.
async fn process_results(
    mut result_rx: mpsc::Receiver<QueryResult>,
    output: Arc<OutputHandler>,
    detector: Option<Arc<WildcardDetector>>,
    stats: Arc<Stats>,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            maybe = result_rx.recv() => match maybe {
                Some(result) => result,
                None => return,
            },
        };

        stats.increment_processed();

        if let QueryResult::Failure { domain, error, .. } = &result {
            stats.increment_errors();
            info!("DNS query error for {domain}: {error}");
            continue;
        }

        if let Some(detector) = &detector {
            if detector.is_wildcard(&result).await {
                stats.increment_wildcards();
                continue;
            }
        }

        let answered = matches!(
            &result,
            QueryResult::Success { response, .. } if !response.answers().is_empty()
        );
        if answered {
            stats.increment_successful();
            output.write_result(&result);
        } else {
            stats.increment_no_answer();
        }
    }
}
