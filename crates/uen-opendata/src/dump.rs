use crate::client::DatastoreQuery;
use crate::{OpenDataClient, OpenDataError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const DUMP_FIELDS: &str = "uen, entity_name, entity_status_description";

/// Entity statuses kept in a dump.
const LIVE_STATUSES: [&str; 2] = ["Live", "na"];

pub fn is_live(record: &Map<String, Value>) -> bool {
    record
        .get("entity_status_description")
        .and_then(Value::as_str)
        .is_some_and(|status| LIVE_STATUSES.contains(&status))
}

#[derive(Debug, Clone)]
pub enum DumpProgress {
    DatasetStarted { dataset: String },
    PageFetched { dataset: String, offset: usize, fetched: usize, kept: usize },
    DatasetWritten { dataset: String, path: PathBuf, kept: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetDump {
    pub dataset: String,
    pub path: PathBuf,
    pub fetched: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DumpReport {
    pub datasets: Vec<DatasetDump>,
}

impl DumpReport {
    pub fn kept(&self) -> usize {
        self.datasets.iter().map(|d| d.kept).sum()
    }
}

impl OpenDataClient {
    /// Page through every child dataset of `collection` and write the live
    /// records of each to `<out_dir>/<dataset>.json`.
    pub fn dump_collection(
        &self,
        collection: &str,
        out_dir: &Path,
        progress: &dyn Fn(&DumpProgress),
    ) -> Result<DumpReport, OpenDataError> {
        let children = self.child_datasets(collection)?;
        fs::create_dir_all(out_dir).map_err(|source| OpenDataError::Io {
            path: out_dir.to_path_buf(),
            source,
        })?;
        tracing::info!(collection, datasets = children.len(), "dumping collection");

        let mut report = DumpReport::default();
        for dataset in children {
            report
                .datasets
                .push(self.dump_dataset(&dataset, out_dir, progress)?);
        }
        Ok(report)
    }

    fn dump_dataset(
        &self,
        dataset: &str,
        out_dir: &Path,
        progress: &dyn Fn(&DumpProgress),
    ) -> Result<DatasetDump, OpenDataError> {
        let page_size = self.config().page_size.max(1);
        progress(&DumpProgress::DatasetStarted {
            dataset: dataset.to_string(),
        });

        let mut offset = 0;
        let mut fetched = 0;
        let mut kept: Vec<Map<String, Value>> = Vec::new();
        loop {
            let query = DatastoreQuery::page(dataset, DUMP_FIELDS, page_size, offset);
            let page = self.datastore_records(&query)?;
            if page.is_empty() {
                break;
            }
            fetched += page.len();
            kept.extend(page.into_iter().filter(is_live));
            offset += page_size;
            tracing::debug!(dataset, offset, kept = kept.len(), "page fetched");
            progress(&DumpProgress::PageFetched {
                dataset: dataset.to_string(),
                offset,
                fetched,
                kept: kept.len(),
            });
        }

        let path = out_dir.join(format!("{dataset}.json"));
        let json = serde_json::to_string_pretty(&kept).map_err(|e| OpenDataError::Decode {
            url: dataset.to_string(),
            message: e.to_string(),
        })?;
        fs::write(&path, json).map_err(|source| OpenDataError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(dataset, fetched, kept = kept.len(), path = %path.display(), "dataset written");
        progress(&DumpProgress::DatasetWritten {
            dataset: dataset.to_string(),
            path: path.clone(),
            kept: kept.len(),
        });

        Ok(DatasetDump {
            dataset: dataset.to_string(),
            path,
            fetched,
            kept: kept.len(),
        })
    }
}
