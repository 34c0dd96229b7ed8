mod fs_source;

pub use fs_source::FsRecordSource;

use crate::records::{EventRecord, MetadataRecord, RecordError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input directory not found: {0:?}")]
    MissingDirectory(PathBuf),

    #[error("Malformed record at {path:?}:{line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: RecordError,
    },

    #[error("Unsupported storage location: {0}")]
    UnsupportedStorage(String),
}

/// Records read from one logical dataset, plus how many lines were dropped
/// as malformed under the lenient policy.
#[derive(Debug, Clone)]
pub struct SourceBatch<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T> SourceBatch<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Supplier of the two raw datasets.
pub trait RecordSource: Send + Sync {
    fn metadata_records(&self) -> Result<SourceBatch<MetadataRecord>, SourceError>;

    fn event_records(&self) -> Result<SourceBatch<EventRecord>, SourceError>;
}
