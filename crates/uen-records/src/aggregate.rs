//! Local record aggregation.
//!
//! Every regular file directly inside the data directory is read as a JSON
//! array of [`Record`]s. Files are visited in file-name order, so "later file
//! wins" is deterministic for a fixed directory. A file that cannot be read or
//! parsed is skipped as a whole: none of its records are applied.

use crate::{LocalRecordSet, Record, RecordsError};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Which dump to load from a data root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Sample,
    Full,
}

impl DataSource {
    pub fn from_sample_flag(use_sample: bool) -> Self {
        if use_sample {
            Self::Sample
        } else {
            Self::Full
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Sample => "sample",
            Self::Full => "full_uen_filtered_list",
        }
    }

    pub fn resolve(self, data_root: &Path) -> PathBuf {
        data_root.join(self.dir_name())
    }
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub records: LocalRecordSet,
    pub files_loaded: usize,
    /// Records read across all loaded files, duplicates included.
    pub records_read: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Parse one dump file.
pub fn read_record_file(path: &Path) -> Result<Vec<Record>, RecordsError> {
    let text = fs::read_to_string(path).map_err(|source| RecordsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| RecordsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Fold every record file in `dir` into one [`LocalRecordSet`].
pub fn load_record_dir(dir: &Path) -> Result<LoadReport, RecordsError> {
    let mut report = LoadReport::default();
    for path in record_files(dir)? {
        match read_record_file(&path) {
            Ok(records) => {
                tracing::debug!(path = %path.display(), count = records.len(), "loaded record file");
                report.files_loaded += 1;
                report.records_read += records.len();
                report.records.extend(records);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping record file");
                report.skipped.push(SkippedFile {
                    path,
                    reason: err.to_string(),
                });
            }
        }
    }
    tracing::info!(
        dir = %dir.display(),
        files = report.files_loaded,
        skipped = report.skipped.len(),
        records = report.records.len(),
        "local records aggregated"
    );
    Ok(report)
}

/// Regular files directly inside `dir`, sorted by file name.
pub(crate) fn record_files(dir: &Path) -> Result<Vec<PathBuf>, RecordsError> {
    if !dir.exists() {
        return Err(RecordsError::MissingDirectory(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(RecordsError::NotADirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => tracing::warn!(dir = %dir.display(), error = %err, "unreadable directory entry"),
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_dirs() {
        let root = Path::new("uen_data");
        assert_eq!(DataSource::Sample.resolve(root), root.join("sample"));
        assert_eq!(
            DataSource::from_sample_flag(false).resolve(root),
            root.join("full_uen_filtered_list")
        );
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_record_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, RecordsError::MissingDirectory(_)));
    }
}
