//! Graceful shutdown under a mid-run cancellation.

mod helpers;

use std::net::Ipv4Addr;
use std::time::Duration;

use hickory_proto::rr::RecordType;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use dnsweep::{run_sweep_with_cancel, Config, OutputFormat};
use helpers::{a_record, probe_answer, write_input_file, MockAnswer, MockUpstream, PROBE_DOMAIN};

#[tokio::test]
async fn cancellation_mid_run_drains_and_reports_consistent_counters() {
    let mock = MockUpstream::spawn(|domain, _| {
        if domain == PROBE_DOMAIN {
            probe_answer()
        } else {
            MockAnswer::Answer(vec![a_record(domain, Ipv4Addr::new(10, 0, 0, 1), 60)])
        }
    })
    .await;

    let domains: Vec<String> = (0..10_000).map(|i| format!("host{i}.big.test")).collect();
    let domain_refs: Vec<&str> = domains.iter().map(String::as_str).collect();
    let input = write_input_file(&domain_refs);
    let output = NamedTempFile::new().unwrap();

    let config = Config {
        input: Some(input.path().to_path_buf()),
        output: Some(output.path().to_path_buf()),
        resolvers: Some(mock.address()),
        query_types: vec![RecordType::A],
        format: OutputFormat::Simple,
        qps: 2_000,
        timeout: Duration::from_secs(1),
        retries: 0,
        workers: 20,
        quiet: true,
        ..Default::default()
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    // The whole pipeline must wind down well within timeout + epsilon.
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        run_sweep_with_cancel(config, cancel),
    )
    .await
    .expect("cancelled sweep must exit promptly")
    .unwrap();

    assert!(report.cancelled);
    assert!(report.total < 10_000, "ingestion must stop at cancellation");
    assert!(report.processed <= report.total);
    assert_eq!(
        report.successful + report.errors + report.no_answer + report.wildcard_suppressed,
        report.processed
    );
}

#[tokio::test]
async fn pre_cancelled_token_short_circuits_the_run() {
    let mock = MockUpstream::spawn(|domain, _| {
        if domain == PROBE_DOMAIN {
            probe_answer()
        } else {
            MockAnswer::Answer(vec![a_record(domain, Ipv4Addr::new(10, 0, 0, 1), 60)])
        }
    })
    .await;

    let input = write_input_file(&["one.test", "two.test"]);
    let output = NamedTempFile::new().unwrap();
    let config = Config {
        input: Some(input.path().to_path_buf()),
        output: Some(output.path().to_path_buf()),
        resolvers: Some(mock.address()),
        quiet: true,
        ..Default::default()
    };

    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        run_sweep_with_cancel(config, cancel),
    )
    .await
    .expect("pre-cancelled sweep must exit promptly")
    .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.processed, 0);
    assert_eq!(
        report.successful + report.errors + report.no_answer + report.wildcard_suppressed,
        report.processed
    );
}
