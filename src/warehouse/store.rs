use super::TableLayout;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use clap::ValueEnum;
use parquet::errors::ParquetError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Schema mismatch: {0}")]
    Schema(String),

    #[error("Invalid partition layout: {0}")]
    Partition(String),

    #[error("Table {0} has no completed write")]
    Incomplete(String),

    #[error("Unsupported storage location: {0}")]
    UnsupportedStorage(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StoreError {
        let path = path.into();
        move |source| StoreError::Io { path, source }
    }
}

/// How a table write treats output left by earlier runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the whole table directory.
    #[default]
    Overwrite,
    /// Add new part files next to the existing ones.
    Append,
}

/// What a single table write produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub table: String,
    pub rows: usize,
    pub files: usize,
    /// Number of partition directories written to, 0 for flat tables.
    pub partitions: usize,
}

/// Persistent home of the warehouse tables.
pub trait WarehouseStore: Send + Sync {
    /// Writes `batch` as table `layout.name`, physically partitioned by
    /// `layout.partition_by`. The table is only readable once this returns.
    fn write_table(&self, layout: &TableLayout, batch: &RecordBatch)
        -> Result<WriteReport, StoreError>;

    /// Reads every row of a completed table. Partition columns are restored
    /// from the layout and appended after the stored columns.
    fn read_table(&self, layout: &TableLayout) -> Result<Vec<RecordBatch>, StoreError>;
}
