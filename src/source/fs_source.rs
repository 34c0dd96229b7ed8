//! Newline-delimited JSON source backed by a local directory tree.

use super::{RecordSource, SourceBatch, SourceError};
use crate::config::StorageSettings;
use crate::records::{EventRecord, MetadataRecord, RecordError, RecordPolicy};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct FsRecordSource {
    song_data_dir: PathBuf,
    log_data_dir: PathBuf,
    policy: RecordPolicy,
}

impl FsRecordSource {
    /// Opens the source under `storage.input_root`. The song corpus is
    /// walked recursively, the log corpus is read as a flat directory.
    pub fn open(
        storage: &StorageSettings,
        song_data_dir: &str,
        log_data_dir: &str,
        policy: RecordPolicy,
    ) -> Result<Self, SourceError> {
        storage
            .ensure_local()
            .map_err(|e| SourceError::UnsupportedStorage(e.to_string()))?;

        let song_data_dir = storage.input_root.join(song_data_dir);
        let log_data_dir = storage.input_root.join(log_data_dir);
        for dir in [&song_data_dir, &log_data_dir] {
            if !dir.is_dir() {
                return Err(SourceError::MissingDirectory(dir.clone()));
            }
        }

        Ok(Self {
            song_data_dir,
            log_data_dir,
            policy,
        })
    }

    fn read_all<T, F>(&self, files: Vec<PathBuf>, parse: F) -> Result<SourceBatch<T>, SourceError>
    where
        T: Send,
        F: Fn(&str) -> Result<T, RecordError> + Sync,
    {
        let per_file: Vec<SourceBatch<T>> = files
            .par_iter()
            .map(|path| read_file(path, &parse, self.policy))
            .collect::<Result<_, _>>()?;

        let mut out = SourceBatch {
            records: Vec::new(),
            skipped: 0,
        };
        for mut batch in per_file {
            out.records.append(&mut batch.records);
            out.skipped += batch.skipped;
        }
        Ok(out)
    }
}

impl RecordSource for FsRecordSource {
    fn metadata_records(&self) -> Result<SourceBatch<MetadataRecord>, SourceError> {
        let files = json_files_recursive(&self.song_data_dir)?;
        info!(
            "Reading song metadata from {} files under {:?}",
            files.len(),
            self.song_data_dir
        );
        self.read_all(files, MetadataRecord::parse)
    }

    fn event_records(&self) -> Result<SourceBatch<EventRecord>, SourceError> {
        let files = json_files_flat(&self.log_data_dir)?;
        info!(
            "Reading event logs from {} files in {:?}",
            files.len(),
            self.log_data_dir
        );
        self.read_all(files, EventRecord::parse)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn json_files_recursive(root: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| SourceError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_owned()),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
        })?;
        if entry.file_type().is_file() && is_json(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn json_files_flat(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let io_err = |source: std::io::Error| SourceError::Io {
        path: dir.to_owned(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_json(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_file<T, F>(path: &Path, parse: &F, policy: RecordPolicy) -> Result<SourceBatch<T>, SourceError>
where
    F: Fn(&str) -> Result<T, RecordError>,
{
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_owned(),
        source,
    })?;

    let mut records = Vec::new();
    let mut skipped = 0;
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse(line) {
            Ok(record) => records.push(record),
            Err(source) => match policy {
                RecordPolicy::Strict => {
                    return Err(SourceError::Malformed {
                        path: path.to_owned(),
                        line: index + 1,
                        source,
                    })
                }
                RecordPolicy::Lenient => {
                    warn!("Skipping {}:{}: {}", path.display(), index + 1, source);
                    skipped += 1;
                }
            },
        }
    }
    debug!("{}: {} records, {} skipped", path.display(), records.len(), skipped);
    Ok(SourceBatch { records, skipped })
}
