mod common;

use std::time::{Duration, Instant};

use assert_matches::assert_matches;

use pubtator_fulltext::error::FulltextError;
use pubtator_fulltext::fetcher::BatchFetcher;
use pubtator_fulltext::output::JsonOutput;
use pubtator_fulltext::progress_log::ProgressLog;
use pubtator_fulltext::rate_limit::RateLimiter;

use common::{MockPubtator, ids, utf8_dir, write_id_table};

const LOG: &str = "batch_log.tsv";

fn new_fetcher(client: MockPubtator) -> BatchFetcher<MockPubtator> {
    BatchFetcher::new(client, RateLimiter::new(1_000, Duration::from_secs(1)).unwrap())
}

#[test]
fn every_chunk_is_fetched_stored_and_logged() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1", "PMC2", "PMC3", "PMC4", "PMC5"]);
    let batches = root.join("batches");

    let fetcher = new_fetcher(MockPubtator::default());
    let report = fetcher
        .fetch_all(&input, 2, &batches, LOG, &JsonOutput)
        .unwrap();

    assert_eq!(report.batches, 3);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.requests, 3);
    assert_eq!(report.logged_ids, 5);
    assert!(report.failures.is_empty());

    let sizes: Vec<usize> = fetcher.client().calls().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    for index in 0..3 {
        assert!(batches.join(format!("batch_{index}.xml")).as_std_path().is_file());
    }

    let log_text = std::fs::read_to_string(batches.join(LOG)).unwrap();
    assert_eq!(
        log_text,
        "batch\tidentifier\n0\tPMC1\n0\tPMC2\n1\tPMC3\n1\tPMC4\n2\tPMC5\n"
    );
}

#[test]
fn second_run_issues_no_requests() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1", "PMC2", "PMC3"]);

    new_fetcher(MockPubtator::default())
        .fetch_all(&input, 2, &root, LOG, &JsonOutput)
        .unwrap();

    let rerun = new_fetcher(MockPubtator::default());
    let report = rerun.fetch_all(&input, 2, &root, LOG, &JsonOutput).unwrap();
    assert!(rerun.client().calls().is_empty());
    assert_eq!(report.skipped, 2);
    assert_eq!(report.requests, 0);

    let log = ProgressLog::initialize(&root, LOG).unwrap();
    assert_eq!(log.rows(), 3);
    assert_eq!(log.len(), 3);
}

#[test]
fn partially_logged_chunk_is_requested_in_full() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1", "PMC2", "PMC3", "PMC4"]);
    std::fs::write(
        root.join(LOG).as_std_path(),
        "batch\tidentifier\n0\tPMC1\n1\tPMC3\n1\tPMC4\n",
    )
    .unwrap();

    let fetcher = new_fetcher(MockPubtator::default());
    let report = fetcher.fetch_all(&input, 2, &root, LOG, &JsonOutput).unwrap();

    assert_eq!(fetcher.client().calls(), vec![ids(&["PMC1", "PMC2"])]);
    assert_eq!(report.fetched, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.logged_ids, 2);

    let log_text = std::fs::read_to_string(root.join(LOG)).unwrap();
    assert!(log_text.ends_with("1\tPMC4\n0\tPMC1\n0\tPMC2\n"));
}

#[test]
fn legacy_log_header_is_honoured() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1", "PMC2"]);
    std::fs::write(
        root.join(LOG).as_std_path(),
        "batch\tpmcid\n0\tPMC1\n0\tPMC2\n",
    )
    .unwrap();

    let fetcher = new_fetcher(MockPubtator::default());
    let report = fetcher.fetch_all(&input, 2, &root, LOG, &JsonOutput).unwrap();
    assert_eq!(report.skipped, 1);
    assert!(fetcher.client().calls().is_empty());
}

#[test]
fn failed_chunk_is_left_pending_and_the_run_continues() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1", "PMC2", "PMC3", "PMC4", "PMC5", "PMC6"]);

    let fetcher = new_fetcher(MockPubtator::default().unavailable_for("PMC3"));
    let report = fetcher.fetch_all(&input, 2, &root, LOG, &JsonOutput).unwrap();

    assert_eq!(report.requests, 3);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.batch, 1);
    assert!(failure.request.ends_with("?pmcids=PMC3,PMC4"));
    assert!(failure.message.contains("503"));
    assert!(!root.join("batch_1.xml").as_std_path().exists());

    let log = ProgressLog::initialize(&root, LOG).unwrap();
    assert!(!log.contains("PMC3"));
    assert!(!log.contains("PMC4"));
    assert!(log.contains("PMC5"));

    let retry = new_fetcher(MockPubtator::default());
    let report = retry.fetch_all(&input, 2, &root, LOG, &JsonOutput).unwrap();
    assert_eq!(retry.client().calls(), vec![ids(&["PMC3", "PMC4"])]);
    assert_eq!(report.fetched, 1);
    assert!(root.join("batch_1.xml").as_std_path().is_file());

    let log = ProgressLog::initialize(&root, LOG).unwrap();
    assert_eq!(log.len(), 6);
    assert_eq!(log.rows(), 6);
}

#[test]
fn malformed_response_is_not_stored() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1", "PMC2", "PMC3"]);

    let fetcher = new_fetcher(MockPubtator::default().garbled_for("PMC1"));
    let report = fetcher.fetch_all(&input, 2, &root, LOG, &JsonOutput).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].batch, 0);
    assert!(report.failures[0].message.contains("malformed XML"));
    assert!(!root.join("batch_0.xml").as_std_path().exists());
    assert!(root.join("batch_1.xml").as_std_path().is_file());

    let log = ProgressLog::initialize(&root, LOG).unwrap();
    assert_eq!(log.len(), 1);
    assert!(log.contains("PMC3"));
}

#[test]
fn missing_input_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);

    let err = new_fetcher(MockPubtator::default())
        .fetch_all(&root.join("absent.tsv"), 10, &root, LOG, &JsonOutput)
        .unwrap_err();
    assert_matches!(err, FulltextError::InputRead { .. });
}

#[test]
fn zero_chunk_size_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1"]);

    let err = new_fetcher(MockPubtator::default())
        .fetch_all(&input, 0, &root, LOG, &JsonOutput)
        .unwrap_err();
    assert_matches!(err, FulltextError::InvalidBatchSize(0));
}

#[test]
fn custom_identifier_column() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1"]);

    let fetcher = new_fetcher(MockPubtator::default()).with_id_column("PMID");
    fetcher.fetch_all(&input, 10, &root, LOG, &JsonOutput).unwrap();
    assert_eq!(fetcher.client().calls(), vec![ids(&["1000"])]);
}

#[test]
fn requests_wait_for_the_rate_gate() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1", "PMC2", "PMC3"]);
    let batches = root.join("batches");

    let limiter = RateLimiter::new(1, Duration::from_millis(150)).unwrap();
    let fetcher = BatchFetcher::new(MockPubtator::default(), limiter.clone());
    let start = Instant::now();
    let report = fetcher
        .fetch_all(&input, 1, &batches, LOG, &JsonOutput)
        .unwrap();

    assert_eq!(report.requests, 3);
    // First call is free; the other two each wait out a full window.
    assert!(start.elapsed() >= Duration::from_millis(300), "took {:?}", start.elapsed());
}
