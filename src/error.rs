use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FulltextError {
    #[error("invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),

    #[error("failed to read identifier list at {path}: {message}")]
    InputRead { path: Utf8PathBuf, message: String },

    #[error("identifier column {column:?} not found in {path}")]
    MissingColumn { column: String, path: Utf8PathBuf },

    #[error("progress log {path}: {message}")]
    ProgressLog { path: Utf8PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("PubTator request failed: {0}")]
    PubtatorHttp(String),

    #[error("PubTator returned status {status}: {message}")]
    PubtatorStatus { status: u16, message: String },

    #[error("malformed XML: {0}")]
    MalformedXml(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
