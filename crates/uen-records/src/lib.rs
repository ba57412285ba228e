//! UEN records: the local side of the registry sync.
//!
//! A UEN (Unique Entity Number) is the government-issued identifier of a
//! registered business. The open-data dump produces directories of JSON files,
//! each an array of objects carrying at least `uen` and `entity_name`:
//!
//! ```text
//! uen_data/
//! ├── sample/                     small fixture set
//! │   └── d_xxx.json
//! └── full_uen_filtered_list/     one file per child dataset
//!     ├── d_aaa.json
//!     └── d_bbb.json
//! ```
//!
//! This crate folds those files into a [`LocalRecordSet`] (last write wins on
//! duplicate identifiers) and offers a small shape analysis over identifiers.

pub mod aggregate;
pub mod analysis;
mod record;

pub use aggregate::{load_record_dir, read_record_file, DataSource, LoadReport, SkippedFile};
pub use analysis::{scan_identifiers, UenShapeStats};
pub use record::{LocalRecordSet, Record};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("data directory {0} does not exist (dump the data from data.gov.sg first)")]
    MissingDirectory(PathBuf),
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
