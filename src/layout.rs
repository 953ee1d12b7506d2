use std::fs;
use std::io::Write;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tempfile::{Builder, NamedTempFile};

use crate::error::FulltextError;

static BATCH_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^batch_(\d+)\.xml$").expect("valid batch file pattern"));

/// File naming inside the temp directory shared by the fetcher and merger.
#[derive(Debug, Clone)]
pub struct BatchLayout {
    temp_dir: Utf8PathBuf,
}

impl BatchLayout {
    pub fn new(temp_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> &Utf8Path {
        &self.temp_dir
    }

    pub fn ensure_dir(&self) -> Result<(), FulltextError> {
        fs::create_dir_all(self.temp_dir.as_std_path()).map_err(|err| {
            FulltextError::Filesystem(format!("create {}: {err}", self.temp_dir))
        })
    }

    pub fn batch_path(&self, index: usize) -> Utf8PathBuf {
        self.temp_dir.join(batch_file_name(index))
    }

    /// Batch files present in the temp directory, ordered by batch index.
    pub fn list_batches(&self) -> Result<Vec<(usize, Utf8PathBuf)>, FulltextError> {
        let entries = fs::read_dir(self.temp_dir.as_std_path()).map_err(|err| {
            FulltextError::Filesystem(format!("read {}: {err}", self.temp_dir))
        })?;

        let mut batches = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| FulltextError::Filesystem(err.to_string()))?;
            if !entry.path().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(index) = batch_index(&name) {
                batches.push((index, self.temp_dir.join(name)));
            }
        }
        batches.sort_by_key(|(index, _)| *index);
        Ok(batches)
    }

    pub fn write_batch(&self, index: usize, content: &[u8]) -> Result<Utf8PathBuf, FulltextError> {
        let path = self.batch_path(index);
        write_bytes_atomic(&path, content)?;
        Ok(path)
    }
}

pub fn batch_file_name(index: usize) -> String {
    format!("batch_{index}.xml")
}

pub fn batch_index(file_name: &str) -> Option<usize> {
    BATCH_FILE
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|value| value.as_str().parse().ok())
}

/// Creates a temporary file next to `path`; persist it with [`persist`].
pub fn sibling_tempfile(path: &Utf8Path) -> Result<NamedTempFile, FulltextError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| FulltextError::Filesystem(format!("create {parent}: {err}")))?;
    Builder::new()
        .prefix(".pubtator-fulltext")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| FulltextError::Filesystem(err.to_string()))
}

pub fn persist(temp: NamedTempFile, path: &Utf8Path) -> Result<(), FulltextError> {
    temp.persist(path.as_std_path())
        .map_err(|err| FulltextError::Filesystem(format!("persist {path}: {err}")))?;
    Ok(())
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), FulltextError> {
    let mut temp = sibling_tempfile(path)?;
    temp.write_all(content)
        .map_err(|err| FulltextError::Filesystem(format!("write {path}: {err}")))?;
    persist(temp, path)
}
