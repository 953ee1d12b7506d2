use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::FulltextError;

pub const DEFAULT_EXPORT_URL: &str =
    "https://www.ncbi.nlm.nih.gov/research/pubtator-api/publications/export/biocxml";

/// Remote source of BioC XML full text for a batch of identifiers.
pub trait FullTextClient: Send + Sync {
    /// The request that [`FullTextClient::export_biocxml`] issues for `ids`,
    /// used in diagnostics so a failed batch can be replayed by hand.
    fn request_url(&self, ids: &[String]) -> String;

    fn export_biocxml(&self, ids: &[String]) -> Result<String, FulltextError>;
}

#[derive(Clone)]
pub struct PubtatorHttpClient {
    client: Client,
    export_url: String,
}

impl PubtatorHttpClient {
    pub fn new(export_url: &str, timeout: Duration) -> Result<Self, FulltextError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pubtator-fulltext/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FulltextError::PubtatorHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| FulltextError::PubtatorHttp(err.to_string()))?;

        Ok(Self {
            client,
            export_url: export_url.trim_end_matches(['?', '/']).to_string(),
        })
    }
}

impl FullTextClient for PubtatorHttpClient {
    fn request_url(&self, ids: &[String]) -> String {
        export_query(&self.export_url, ids)
    }

    fn export_biocxml(&self, ids: &[String]) -> Result<String, FulltextError> {
        let url = self.request_url(ids);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| FulltextError::PubtatorHttp(err.to_string()))?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "PubTator request failed".to_string());
            return Err(FulltextError::PubtatorStatus { status, message });
        }

        response
            .text()
            .map_err(|err| FulltextError::PubtatorHttp(err.to_string()))
    }
}

pub fn export_query(export_url: &str, ids: &[String]) -> String {
    format!("{export_url}?pmcids={}", ids.join(","))
}
