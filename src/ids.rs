use std::fs::File;

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, StringRecordsIntoIter};
use serde::Serialize;

use crate::error::FulltextError;

/// One fixed-size window of the identifier list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdBatch {
    pub index: usize,
    pub ids: Vec<String>,
}

/// Lazily reads a tab-separated identifier list in windows of `chunk_size`
/// data rows. Blank identifier cells are dropped but still count toward the
/// window, so an input of M rows always yields ceil(M / chunk_size) batches.
pub struct IdChunks {
    path: Utf8PathBuf,
    records: StringRecordsIntoIter<File>,
    column: usize,
    chunk_size: usize,
    next_index: usize,
    done: bool,
}

impl IdChunks {
    pub fn open(path: &Utf8Path, column: &str, chunk_size: usize) -> Result<Self, FulltextError> {
        if chunk_size == 0 {
            return Err(FulltextError::InvalidBatchSize(chunk_size));
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path.as_std_path())
            .map_err(|err| FulltextError::InputRead {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;

        let headers = reader.headers().map_err(|err| FulltextError::InputRead {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let column_index = headers
            .iter()
            .position(|name| name.trim() == column)
            .ok_or_else(|| FulltextError::MissingColumn {
                column: column.to_string(),
                path: path.to_path_buf(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            records: reader.into_records(),
            column: column_index,
            chunk_size,
            next_index: 0,
            done: false,
        })
    }
}

impl Iterator for IdChunks {
    type Item = Result<IdBatch, FulltextError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut ids = Vec::with_capacity(self.chunk_size);
        let mut rows = 0usize;
        while rows < self.chunk_size {
            match self.records.next() {
                Some(Ok(record)) => {
                    rows += 1;
                    if let Some(value) = record.get(self.column) {
                        let value = value.trim();
                        if !value.is_empty() {
                            ids.push(value.to_string());
                        }
                    }
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(FulltextError::InputRead {
                        path: self.path.clone(),
                        message: err.to_string(),
                    }));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if rows == 0 {
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;
        Some(Ok(IdBatch { index, ids }))
    }
}
