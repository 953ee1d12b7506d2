use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FulltextError;
use crate::pubtator::DEFAULT_EXPORT_URL;

pub const DEFAULT_CONFIG_FILE: &str = "pubtator-fulltext.json";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_LOG_FILE: &str = "batch_log.tsv";
pub const DEFAULT_OUTPUT: &str = "pubtator_full_text.xml";
pub const DEFAULT_ID_COLUMN: &str = "PMCID";
pub const EXPORT_URL_ENV: &str = "PUBTATOR_EXPORT_URL";

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RATE_CALLS: u32 = 10_000;
const DEFAULT_RATE_PERIOD_SECS: u64 = 15 * 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub export_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub id_column: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub calls: u32,
    pub period_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub export_url: String,
    pub timeout: Duration,
    pub rate_calls: u32,
    pub rate_period: Duration,
    pub id_column: String,
    pub batch_size: usize,
    pub log_file: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            export_url: DEFAULT_EXPORT_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            rate_calls: DEFAULT_RATE_CALLS,
            rate_period: Duration::from_secs(DEFAULT_RATE_PERIOD_SECS),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config at `path`, or `pubtator-fulltext.json` in the current
    /// directory when no path is given. A missing default file yields the
    /// built-in defaults; a missing explicit file is an error.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, FulltextError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| FulltextError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| FulltextError::ConfigParse(err.to_string()))?
        };

        let mut resolved = Self::resolve_config(config)?;
        if let Ok(url) = std::env::var(EXPORT_URL_ENV) {
            if !url.trim().is_empty() {
                resolved.export_url = url.trim().to_string();
            }
        }
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FulltextError> {
        let defaults = ResolvedConfig::default();

        let batch_size = config.batch_size.unwrap_or(defaults.batch_size);
        if batch_size == 0 {
            return Err(FulltextError::InvalidBatchSize(batch_size));
        }

        let (rate_calls, rate_period) = match config.rate_limit {
            Some(limit) => {
                if limit.calls == 0 || limit.period_secs == 0 {
                    return Err(FulltextError::InvalidRateLimit(format!(
                        "{} calls per {}s",
                        limit.calls, limit.period_secs
                    )));
                }
                (limit.calls, Duration::from_secs(limit.period_secs))
            }
            None => (defaults.rate_calls, defaults.rate_period),
        };

        let id_column = config
            .id_column
            .map(|column| column.trim().to_string())
            .filter(|column| !column.is_empty())
            .unwrap_or(defaults.id_column);

        Ok(ResolvedConfig {
            export_url: config.export_url.unwrap_or(defaults.export_url),
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            rate_calls,
            rate_period,
            id_column,
            batch_size,
            log_file: config.log_file.unwrap_or(defaults.log_file),
        })
    }
}
