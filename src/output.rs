use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{ProgressEvent, ProgressSink, RunResult};
use crate::fetcher::FetchReport;
use crate::merger::MergeReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_merge(result: &MergeReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress events to the log.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

pub fn print_fetch_summary(report: &FetchReport) {
    println!("fetch summary");
    println!("  batches read:    {}", report.batches);
    println!("  fetched:         {}", report.fetched);
    println!("  already fetched: {}", report.skipped);
    println!("  ids logged:      {}", report.logged_ids);
    println!("  failed:          {}", report.failures.len());
    for failure in &report.failures {
        println!("    batch {}: {}", failure.batch, failure.message);
        println!("      request: {}", failure.request);
    }
}

pub fn print_merge_summary(report: &MergeReport) {
    println!("merge summary");
    println!("  batch files: {}", report.files);
    println!("  merged:      {}", report.merged);
    println!("  documents:   {}", report.documents);
    println!("  skipped:     {}", report.failures.len());
    for failure in &report.failures {
        println!("    {}: {}", failure.file, failure.message);
    }
}
