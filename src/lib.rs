//! Pezzottify Warehouse Library
//!
//! Builds a star schema of song plays out of a song metadata corpus and a
//! listening event log, and stores it as partitioned Parquet tables.

pub mod config;
pub mod pipeline;
pub mod records;
pub mod source;
pub mod transform;
pub mod warehouse;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig, PipelineSettings, StorageSettings};
pub use pipeline::{Pipeline, PipelineError, PipelineStep, RunSummary};
pub use records::RecordPolicy;
pub use source::{FsRecordSource, RecordSource};
pub use warehouse::{ParquetWarehouseStore, StoreError, WarehouseStore, WriteMode};
