use std::fs;
use std::io::{BufWriter, Write};
use std::time::Instant;

use camino::Utf8Path;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::bioc::{self, COLLECTION_TAG, Collection, DATE_TAG};
use crate::error::FulltextError;
use crate::layout::{self, BatchLayout};

pub const DATE_FORMAT: &str = "%Y/%m/%d";

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    /// Batch files found in the temp directory.
    pub files: usize,
    /// Batch files that parsed and were merged.
    pub merged: usize,
    pub documents: usize,
    /// Batch index whose header fields were copied to the output.
    pub header_from: Option<usize>,
    pub failures: Vec<MergeFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeFailure {
    pub file: String,
    pub message: String,
}

/// Concatenates the documents of every batch file into one collection.
pub struct CollectionMerger {
    run_date: NaiveDate,
}

impl CollectionMerger {
    pub fn new(run_date: NaiveDate) -> Self {
        Self { run_date }
    }

    pub fn today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn run_date(&self) -> String {
        self.run_date.format(DATE_FORMAT).to_string()
    }

    /// Writes `output_path` from the batch files in `temp_dir`, taken in batch
    /// index order. Unreadable or malformed batch files are skipped with a
    /// diagnostic. The container tags are written even when nothing parses.
    pub fn merge(
        &self,
        temp_dir: &Utf8Path,
        output_path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<MergeReport, FulltextError> {
        let batches = BatchLayout::new(temp_dir).list_batches()?;
        let run_date = self.run_date();
        let mut report = MergeReport::default();

        sink.event(ProgressEvent {
            message: format!("phase=Merge; {} batch files in {temp_dir}", batches.len()),
            elapsed: None,
        });

        let mut temp = layout::sibling_tempfile(output_path)?;
        {
            let mut out = BufWriter::new(&mut temp);
            write_output(&mut out, format!("<{COLLECTION_TAG}>\n").as_bytes(), output_path)?;

            for (index, path) in batches {
                report.files += 1;
                let start = Instant::now();
                let collection = match read_collection(&path) {
                    Ok(collection) => collection,
                    Err(err) => {
                        warn!(file = %path, error = %err, "cannot merge batch file; skipping");
                        report.failures.push(MergeFailure {
                            file: path.to_string(),
                            message: err.to_string(),
                        });
                        continue;
                    }
                };

                if report.header_from.is_none() {
                    for field in &collection.header {
                        if field.name() == DATE_TAG {
                            write_output(&mut out, &field.with_text(&run_date)?, output_path)?;
                        } else {
                            write_output(&mut out, field.as_bytes(), output_path)?;
                        }
                        write_output(&mut out, b"\n", output_path)?;
                    }
                    report.header_from = Some(index);
                }

                for document in &collection.documents {
                    write_output(&mut out, document.as_bytes(), output_path)?;
                    write_output(&mut out, b"\n", output_path)?;
                }

                report.merged += 1;
                report.documents += collection.documents.len();
                sink.event(ProgressEvent {
                    message: format!(
                        "batch {index}: merged {} documents",
                        collection.documents.len()
                    ),
                    elapsed: Some(start.elapsed()),
                });
            }

            write_output(&mut out, format!("</{COLLECTION_TAG}>\n").as_bytes(), output_path)?;
            out.flush()
                .map_err(|err| FulltextError::Filesystem(format!("write {output_path}: {err}")))?;
        }
        layout::persist(temp, output_path)?;

        info!(
            files = report.files,
            merged = report.merged,
            documents = report.documents,
            failed = report.failures.len(),
            output = %output_path,
            "merge finished"
        );
        Ok(report)
    }
}

fn read_collection(path: &Utf8Path) -> Result<Collection, FulltextError> {
    let bytes = fs::read(path.as_std_path())
        .map_err(|err| FulltextError::Filesystem(format!("read {path}: {err}")))?;
    bioc::parse_collection(&bytes)
}

fn write_output(out: &mut impl Write, bytes: &[u8], path: &Utf8Path) -> Result<(), FulltextError> {
    out.write_all(bytes)
        .map_err(|err| FulltextError::Filesystem(format!("write {path}: {err}")))
}
