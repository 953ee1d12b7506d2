use std::time::Instant;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::DEFAULT_ID_COLUMN;
use crate::error::FulltextError;
use crate::ids::{IdBatch, IdChunks};
use crate::layout::BatchLayout;
use crate::progress_log::ProgressLog;
use crate::pubtator::FullTextClient;
use crate::rate_limit::RateLimiter;

#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    /// Chunks read from the identifier list.
    pub batches: usize,
    /// Chunks whose identifiers were all logged already.
    pub skipped: usize,
    /// Chunks written to disk and logged in this run.
    pub fetched: usize,
    /// Export requests issued, successful or not.
    pub requests: usize,
    /// Log rows appended in this run.
    pub logged_ids: usize,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub batch: usize,
    pub request: String,
    pub message: String,
}

/// Downloads full text for an identifier list one chunk at a time, resuming
/// from whatever the progress log already records.
pub struct BatchFetcher<C: FullTextClient> {
    client: C,
    limiter: RateLimiter,
    id_column: String,
}

impl<C: FullTextClient> BatchFetcher<C> {
    pub fn new(client: C, limiter: RateLimiter) -> Self {
        Self {
            client,
            limiter,
            id_column: DEFAULT_ID_COLUMN.to_string(),
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetches every chunk of `ids_source` that still has unlogged
    /// identifiers. Per-chunk failures are reported in the returned
    /// [`FetchReport`]; only setup failures (unreadable input, unwritable
    /// temp dir or log) are returned as errors.
    pub fn fetch_all(
        &self,
        ids_source: &Utf8Path,
        chunk_size: usize,
        temp_dir: &Utf8Path,
        log_file: &str,
        sink: &dyn ProgressSink,
    ) -> Result<FetchReport, FulltextError> {
        if chunk_size == 0 {
            return Err(FulltextError::InvalidBatchSize(chunk_size));
        }

        let layout = BatchLayout::new(temp_dir);
        layout.ensure_dir()?;
        let mut log = ProgressLog::initialize(temp_dir, log_file)?;
        let chunks = IdChunks::open(ids_source, &self.id_column, chunk_size)?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Fetch; {} identifiers already logged in {}",
                log.len(),
                log.path()
            ),
            elapsed: None,
        });

        let mut report = FetchReport::default();
        for chunk in chunks {
            let chunk = chunk?;
            report.batches += 1;

            let pending = log.pending(&chunk.ids).len();
            if pending == 0 {
                report.skipped += 1;
                sink.event(ProgressEvent {
                    message: format!("batch {}: already fetched; skipping", chunk.index),
                    elapsed: None,
                });
                continue;
            }

            let request = self.client.request_url(&chunk.ids);
            let start = Instant::now();
            report.requests += 1;
            match self.fetch_chunk(&chunk, &layout, &mut log) {
                Ok(()) => {
                    report.fetched += 1;
                    report.logged_ids += chunk.ids.len();
                    sink.event(ProgressEvent {
                        message: format!(
                            "batch {}: fetched {} identifiers ({pending} new)",
                            chunk.index,
                            chunk.ids.len()
                        ),
                        elapsed: Some(start.elapsed()),
                    });
                }
                Err(err) => {
                    warn!(
                        batch = chunk.index,
                        request = %request,
                        error = %err,
                        "error processing batch; skipping"
                    );
                    report.failures.push(BatchFailure {
                        batch: chunk.index,
                        request,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            batches = report.batches,
            fetched = report.fetched,
            skipped = report.skipped,
            failed = report.failures.len(),
            "fetch finished"
        );
        Ok(report)
    }

    /// Requests the whole chunk, stores the response, then logs every
    /// identifier of the chunk. Nothing is logged unless the batch file was
    /// written.
    fn fetch_chunk(
        &self,
        chunk: &IdBatch,
        layout: &BatchLayout,
        log: &mut ProgressLog,
    ) -> Result<(), FulltextError> {
        self.limiter.acquire();
        let body = self.client.export_biocxml(&chunk.ids)?;
        let xml = crate::bioc::reserialize(&body)?;
        layout.write_batch(chunk.index, &xml)?;
        log.append(chunk.index, &chunk.ids)
    }
}
