use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::error::FulltextError;
use crate::fetcher::{BatchFetcher, FetchReport};
use crate::merger::{CollectionMerger, MergeReport};
use crate::pubtator::FullTextClient;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub ids_source: Utf8PathBuf,
    pub batch_size: usize,
    pub temp_dir: Utf8PathBuf,
    pub log_file: String,
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub temp_dir: Utf8PathBuf,
    pub output: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub fetch: FetchReport,
    pub merge: MergeReport,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Fetch-then-merge driver. The two phases share nothing but the temp
/// directory.
pub struct App<C: FullTextClient> {
    fetcher: BatchFetcher<C>,
    merger: CollectionMerger,
}

impl<C: FullTextClient> App<C> {
    pub fn new(fetcher: BatchFetcher<C>, merger: CollectionMerger) -> Self {
        Self { fetcher, merger }
    }

    pub fn fetch(
        &self,
        options: &FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchReport, FulltextError> {
        self.fetcher.fetch_all(
            &options.ids_source,
            options.batch_size,
            &options.temp_dir,
            &options.log_file,
            sink,
        )
    }

    pub fn merge(
        &self,
        options: &MergeOptions,
        sink: &dyn ProgressSink,
    ) -> Result<MergeReport, FulltextError> {
        self.merger.merge(&options.temp_dir, &options.output, sink)
    }

    pub fn run(
        &self,
        options: &FetchOptions,
        output: Utf8PathBuf,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, FulltextError> {
        let fetch = self.fetch(options, sink)?;
        let merge = self.merge(
            &MergeOptions {
                temp_dir: options.temp_dir.clone(),
                output,
            },
            sink,
        )?;
        Ok(RunResult { fetch, merge })
    }
}
