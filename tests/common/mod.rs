#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};

use pubtator_fulltext::error::FulltextError;
use pubtator_fulltext::pubtator::{FullTextClient, export_query};

pub const EXPORT_URL: &str = "http://pubtator.test/export/biocxml";

/// Answers every export with one `<document>` per identifier, except for
/// identifiers registered as failing.
#[derive(Default)]
pub struct MockPubtator {
    calls: Mutex<Vec<Vec<String>>>,
    unavailable: HashSet<String>,
    garbled: HashSet<String>,
}

impl MockPubtator {
    /// Any chunk containing `id` gets a 503.
    pub fn unavailable_for(mut self, id: &str) -> Self {
        self.unavailable.insert(id.to_string());
        self
    }

    /// Any chunk containing `id` gets a truncated XML body.
    pub fn garbled_for(mut self, id: &str) -> Self {
        self.garbled.insert(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl FullTextClient for MockPubtator {
    fn request_url(&self, ids: &[String]) -> String {
        export_query(EXPORT_URL, ids)
    }

    fn export_biocxml(&self, ids: &[String]) -> Result<String, FulltextError> {
        self.calls.lock().unwrap().push(ids.to_vec());
        if ids.iter().any(|id| self.unavailable.contains(id)) {
            return Err(FulltextError::PubtatorStatus {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        if ids.iter().any(|id| self.garbled.contains(id)) {
            return Ok("<collection><source>PubTator</source><document><id>".to_string());
        }
        Ok(collection_xml("PubTator", "2020/01/01", ids))
    }
}

pub fn collection_xml(source: &str, date: &str, ids: &[String]) -> String {
    let mut xml = String::from("<?xml version='1.0' encoding='UTF-8'?>\n");
    xml.push_str("<!DOCTYPE collection SYSTEM \"BioC.dtd\">\n");
    xml.push_str(&format!(
        "<collection><source>{source}</source><date>{date}</date><key>BioC.key</key>"
    ));
    for id in ids {
        xml.push_str(&format!(
            "<document><id>{id}</id><passage><offset>0</offset><text>{id} text</text></passage></document>"
        ));
    }
    xml.push_str("</collection>\n");
    xml
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub fn utf8_dir(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

/// Writes a PMID/PMCID table like the ones produced by the PMC id converter.
pub fn write_id_table(dir: &Utf8Path, pmcids: &[&str]) -> Utf8PathBuf {
    let path = dir.join("ids.tsv");
    let mut content = String::from("PMID\tPMCID\tDOI\n");
    for (row, pmcid) in pmcids.iter().enumerate() {
        content.push_str(&format!("{}\t{pmcid}\t10.1000/{row}\n", 1000 + row));
    }
    std::fs::write(path.as_std_path(), content).unwrap();
    path
}
