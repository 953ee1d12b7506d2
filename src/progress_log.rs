use std::collections::HashSet;
use std::fs::{self, OpenOptions};

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, WriterBuilder};
use tracing::debug;

use crate::error::FulltextError;

pub const LOG_HEADER: [&str; 2] = ["batch", "identifier"];

/// Append-only record of identifiers whose batch file has been written.
///
/// Rows are `batch<TAB>identifier`. The file is never rewritten; every
/// successful batch appends its rows and flushes before the next batch starts.
#[derive(Debug)]
pub struct ProgressLog {
    path: Utf8PathBuf,
    seen: HashSet<String>,
    rows: usize,
}

impl ProgressLog {
    /// Creates `temp_dir/log_file` with only the header row if it does not
    /// exist yet (or is empty), otherwise loads every logged identifier into memory.
    pub fn initialize(temp_dir: &Utf8Path, log_file: &str) -> Result<Self, FulltextError> {
        let path = temp_dir.join(log_file);
        let fresh = fs::metadata(path.as_std_path())
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);
        if fresh {
            let mut writer = WriterBuilder::new()
                .delimiter(b'\t')
                .from_path(path.as_std_path())
                .map_err(|err| log_error(&path, err))?;
            writer
                .write_record(LOG_HEADER)
                .map_err(|err| log_error(&path, err))?;
            writer.flush().map_err(|err| log_error(&path, err))?;
            debug!(path = %path, "created progress log");
            return Ok(Self {
                path,
                seen: HashSet::new(),
                rows: 0,
            });
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path.as_std_path())
            .map_err(|err| log_error(&path, err))?;

        // The identifier is read positionally so older logs with a differently
        // named second column still load.
        let mut seen = HashSet::new();
        let mut rows = 0usize;
        for record in reader.records() {
            let record = record.map_err(|err| log_error(&path, err))?;
            if let Some(id) = record.get(1) {
                let id = id.trim();
                if !id.is_empty() {
                    seen.insert(id.to_string());
                    rows += 1;
                }
            }
        }
        debug!(path = %path, rows, identifiers = seen.len(), "loaded progress log");

        Ok(Self { path, seen, rows })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Identifiers of `ids` that have not been logged yet, in input order.
    pub fn pending<'a>(&self, ids: &'a [String]) -> Vec<&'a str> {
        ids.iter()
            .map(String::as_str)
            .filter(|id| !self.contains(id))
            .collect()
    }

    /// Number of distinct logged identifiers.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Number of data rows in the log, duplicates included.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn append(&mut self, batch: usize, ids: &[String]) -> Result<(), FulltextError> {
        let file = OpenOptions::new()
            .append(true)
            .open(self.path.as_std_path())
            .map_err(|err| log_error(&self.path, err))?;
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(file);

        let batch = batch.to_string();
        for id in ids {
            writer
                .write_record([batch.as_str(), id.as_str()])
                .map_err(|err| log_error(&self.path, err))?;
        }
        writer.flush().map_err(|err| log_error(&self.path, err))?;

        self.seen.extend(ids.iter().cloned());
        self.rows += ids.len();
        Ok(())
    }
}

fn log_error(path: &Utf8Path, err: impl std::fmt::Display) -> FulltextError {
    FulltextError::ProgressLog {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
