//! data.gov.sg open-data access: collection and dataset metadata, paginated
//! `datastore_search`, and a full dump of a collection to disk.
//!
//! The ACRA UEN collection (id `2`) is split into child datasets whose ids
//! start with `d`. A dump writes one JSON array per child dataset, keeping
//! only live entities, in the layout `uen-records` reads back.

mod client;
mod dump;

pub use client::{DatastoreQuery, OpenDataClient, OpenDataConfig, ACRA_UEN_COLLECTION};
pub use dump::{is_live, DatasetDump, DumpProgress, DumpReport};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum OpenDataError {
    #[error("rate limited at {url} ({code}: {message})")]
    RateLimited {
        url: String,
        code: String,
        message: String,
    },
    #[error("bad request at {url} ({code}: {message})")]
    BadRequest {
        url: String,
        code: String,
        message: String,
    },
    #[error("unprocessable entity at {url} ({code}: {message})")]
    Unprocessable {
        url: String,
        code: String,
        message: String,
    },
    #[error("http error {status} at {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("collection {collection} has unexpected child datasets: {found}")]
    InvalidChildDatasets { collection: String, found: String },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
