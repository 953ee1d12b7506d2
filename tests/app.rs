mod common;

use std::time::Duration;

use chrono::NaiveDate;

use pubtator_fulltext::app::{App, FetchOptions, MergeOptions};
use pubtator_fulltext::bioc::parse_collection;
use pubtator_fulltext::fetcher::BatchFetcher;
use pubtator_fulltext::merger::CollectionMerger;
use pubtator_fulltext::output::JsonOutput;
use pubtator_fulltext::rate_limit::RateLimiter;

use common::{MockPubtator, utf8_dir, write_id_table};

fn app(client: MockPubtator) -> App<MockPubtator> {
    let limiter = RateLimiter::new(100, Duration::from_secs(1)).unwrap();
    App::new(
        BatchFetcher::new(client, limiter),
        CollectionMerger::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()),
    )
}

#[test]
fn run_fetches_then_merges_everything() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1", "PMC2", "PMC3", "PMC4", "PMC5"]);
    let options = FetchOptions {
        ids_source: input,
        batch_size: 2,
        temp_dir: root.join("tmp"),
        log_file: "batch_log.tsv".to_string(),
    };

    let output = root.join("pubtator_full_text.xml");
    let result = app(MockPubtator::default())
        .run(&options, output.clone(), &JsonOutput)
        .unwrap();

    assert_eq!(result.fetch.fetched, 3);
    assert_eq!(result.merge.merged, 3);
    assert_eq!(result.merge.documents, 5);

    let merged = std::fs::read(output.as_std_path()).unwrap();
    let collection = parse_collection(&merged).unwrap();
    assert_eq!(collection.documents.len(), 5);
    let text = String::from_utf8(merged).unwrap();
    assert!(text.contains("<date>2026/10/19</date>"));
}

#[test]
fn merge_after_partial_fetch_contains_only_stored_batches() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1", "PMC2", "PMC3", "PMC4"]);
    let options = FetchOptions {
        ids_source: input,
        batch_size: 2,
        temp_dir: root.join("tmp"),
        log_file: "batch_log.tsv".to_string(),
    };

    let app = app(MockPubtator::default().unavailable_for("PMC4"));
    let fetch = app.fetch(&options, &JsonOutput).unwrap();
    assert_eq!(fetch.failures.len(), 1);

    let merge = app
        .merge(
            &MergeOptions {
                temp_dir: options.temp_dir.clone(),
                output: root.join("out.xml"),
            },
            &JsonOutput,
        )
        .unwrap();
    assert_eq!(merge.files, 1);
    assert_eq!(merge.documents, 2);
}

#[test]
fn run_report_serializes_to_json() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_dir(&temp);
    let input = write_id_table(&root, &["PMC1"]);
    let options = FetchOptions {
        ids_source: input,
        batch_size: 10,
        temp_dir: root.clone(),
        log_file: "batch_log.tsv".to_string(),
    };

    let result = app(MockPubtator::default())
        .run(&options, root.join("out.xml"), &JsonOutput)
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["fetch"]["fetched"], 1);
    assert_eq!(json["merge"]["documents"], 1);
    assert_eq!(json["merge"]["header_from"], 0);
}
