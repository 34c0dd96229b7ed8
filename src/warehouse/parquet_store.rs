//! Local filesystem warehouse writing one Parquet file per partition.
//!
//! Layout under the output root:
//!
//! ```text
//! songs/_SUCCESS
//! songs/year=2000/artist_id=A1/part-00000-<run>.parquet
//! artists/_SUCCESS
//! artists/part-00000-<run>.parquet
//! ```
//!
//! `_SUCCESS` is written last and synced; a table without it is treated as
//! unreadable.

use super::partition::{parse_relative_dir, restore_columns, split_batch};
use super::{StoreError, TableLayout, WarehouseStore, WriteMode, WriteReport};
use crate::config::StorageSettings;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

pub const SUCCESS_MARKER: &str = "_SUCCESS";

pub struct ParquetWarehouseStore {
    root: PathBuf,
    mode: WriteMode,
    run_id: String,
}

impl ParquetWarehouseStore {
    pub fn open(storage: &StorageSettings, mode: WriteMode) -> Result<Self, StoreError> {
        storage
            .ensure_local()
            .map_err(|e| StoreError::UnsupportedStorage(e.to_string()))?;
        if storage.credentials.is_some() {
            debug!("Storage credentials supplied but not needed by the local backend");
        }
        fs::create_dir_all(&storage.output_root).map_err(StoreError::io(&storage.output_root))?;
        Ok(Self::at_root(&storage.output_root, mode))
    }

    /// Store over an existing warehouse directory, without any checks.
    pub fn at_root(root: impl Into<PathBuf>, mode: WriteMode) -> Self {
        Self {
            root: root.into(),
            mode,
            run_id: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    /// Names of the tables with a completed write, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let mut tables = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(StoreError::io(&self.root))? {
            let path = entry.map_err(StoreError::io(&self.root))?.path();
            if path.join(SUCCESS_MARKER).is_file() {
                if let Some(name) = path.file_name() {
                    tables.push(name.to_string_lossy().to_string());
                }
            }
        }
        tables.sort();
        Ok(tables)
    }

    /// Partition directories of a table relative to its root, sorted.
    pub fn list_partitions(&self, table: &str) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.table_dir(table);
        let mut partitions: Vec<PathBuf> = data_files(&dir)?
            .iter()
            .filter_map(|f| f.parent()?.strip_prefix(&dir).ok().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        partitions.sort();
        partitions.dedup();
        Ok(partitions)
    }

    fn part_file_name(&self) -> String {
        format!("part-00000-{}.parquet", self.run_id)
    }
}

impl WarehouseStore for ParquetWarehouseStore {
    fn write_table(
        &self,
        layout: &TableLayout,
        batch: &RecordBatch,
    ) -> Result<WriteReport, StoreError> {
        let dir = self.table_dir(layout.name);
        let marker = dir.join(SUCCESS_MARKER);
        match self.mode {
            WriteMode::Overwrite if dir.exists() => {
                debug!("Removing previous output {:?}", dir);
                fs::remove_dir_all(&dir).map_err(StoreError::io(&dir))?;
            }
            WriteMode::Append if marker.exists() => {
                fs::remove_file(&marker).map_err(StoreError::io(&marker))?;
            }
            _ => {}
        }
        fs::create_dir_all(&dir).map_err(StoreError::io(&dir))?;

        let mut report = WriteReport {
            table: layout.name.to_string(),
            rows: batch.num_rows(),
            files: 0,
            partitions: 0,
        };

        if layout.is_partitioned() {
            for partition in split_batch(batch, &layout.partition_by)? {
                let partition_dir = dir.join(partition.relative_dir());
                fs::create_dir_all(&partition_dir).map_err(StoreError::io(&partition_dir))?;
                write_parquet(&partition_dir.join(self.part_file_name()), &partition.batch)?;
                report.files += 1;
                report.partitions += 1;
            }
        } else {
            write_parquet(&dir.join(self.part_file_name()), batch)?;
            report.files = 1;
        }

        let marker_file = File::create(&marker).map_err(StoreError::io(&marker))?;
        marker_file.sync_all().map_err(StoreError::io(&marker))?;

        info!(
            "Wrote table {}: {} rows in {} files ({} partitions)",
            report.table, report.rows, report.files, report.partitions
        );
        Ok(report)
    }

    fn read_table(&self, layout: &TableLayout) -> Result<Vec<RecordBatch>, StoreError> {
        let dir = self.table_dir(layout.name);
        if !dir.join(SUCCESS_MARKER).is_file() {
            return Err(StoreError::Incomplete(layout.name.to_string()));
        }

        let mut batches = Vec::new();
        for file in data_files(&dir)? {
            let relative = file
                .parent()
                .and_then(|p| p.strip_prefix(&dir).ok())
                .unwrap_or_else(|| Path::new(""));
            let values = parse_relative_dir(relative)?;
            let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
            if columns != layout.partition_by {
                return Err(StoreError::Partition(format!(
                    "{:?} does not match partitioning {:?} of table {}",
                    relative, layout.partition_by, layout.name
                )));
            }

            let reader = ParquetRecordBatchReaderBuilder::try_new(
                File::open(&file).map_err(StoreError::io(&file))?,
            )?
            .build()?;
            for batch in reader {
                batches.push(restore_columns(batch?, &values, &layout.schema)?);
            }
        }
        debug!("Read {} batches from table {}", batches.len(), layout.name);
        Ok(batches)
    }
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(format!("pezzottify-warehouse {}", env!("CARGO_PKG_VERSION"))),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<(), StoreError> {
    let file = File::create(path).map_err(StoreError::io(path))?;
    let mut writer = ArrowWriter::try_new(
        file.try_clone().map_err(StoreError::io(path))?,
        batch.schema(),
        Some(writer_properties()),
    )?;
    writer.write(batch)?;
    writer.close()?;
    file.sync_all().map_err(StoreError::io(path))?;
    Ok(())
}

/// Parquet files under a table directory, skipping hidden and marker files.
fn data_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| StoreError::Io {
            path: dir.to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
        })?;
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_file()
            && name.ends_with(".parquet")
            && !name.starts_with('_')
            && !name.starts_with('.')
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
