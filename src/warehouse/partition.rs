//! Hive-style partition layout.
//!
//! A partitioned table is split into one directory per distinct combination
//! of partition values, nested in `partition_by` order:
//! `songs/year=2000/artist_id=A1/part-....parquet`. Values are
//! percent-encoded; a null value is written as [`DEFAULT_PARTITION`].
//! Partition columns are removed from the file contents and restored from
//! the path when reading.

use super::StoreError;
use arrow::array::{new_null_array, Array, ArrayRef, StringArray, UInt32Array};
use arrow::compute::{cast_with_options, take_record_batch, CastOptions};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// One partition's relative directory and its rows, partition columns removed.
#[derive(Debug)]
pub struct Partition {
    pub values: Vec<(String, Option<String>)>,
    pub batch: RecordBatch,
}

impl Partition {
    pub fn relative_dir(&self) -> PathBuf {
        self.values
            .iter()
            .map(|(column, value)| segment(column, value.as_deref()))
            .collect()
    }
}

/// `column=value` directory name for one partition value.
pub fn segment(column: &str, value: Option<&str>) -> String {
    match value {
        Some(v) => format!("{}={}", column, urlencoding::encode(v)),
        None => format!("{}={}", column, DEFAULT_PARTITION),
    }
}

/// Splits `batch` by the values of `partition_by`. Partitions are returned
/// in ascending order of their values' string form.
pub fn split_batch(batch: &RecordBatch, partition_by: &[&str]) -> Result<Vec<Partition>, StoreError> {
    let schema = batch.schema();
    let mut key_columns = Vec::with_capacity(partition_by.len());
    for name in partition_by {
        let column = batch
            .column_by_name(name)
            .cloned()
            .ok_or_else(|| StoreError::Schema(format!("missing partition column '{name}'")))?;
        key_columns.push(column);
    }

    let mut groups: BTreeMap<Vec<Option<String>>, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let mut key = Vec::with_capacity(key_columns.len());
        for column in &key_columns {
            if column.is_null(row) {
                key.push(None);
            } else {
                key.push(Some(array_value_to_string(&**column, row)?));
            }
        }
        groups.entry(key).or_default().push(row as u32);
    }

    let data_columns: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !partition_by.contains(&f.name().as_str()))
        .map(|(i, _)| i)
        .collect();

    let mut partitions = Vec::with_capacity(groups.len());
    for (key, rows) in groups {
        let taken = take_record_batch(batch, &UInt32Array::from(rows))?;
        let values = partition_by
            .iter()
            .map(|c| c.to_string())
            .zip(key)
            .collect();
        partitions.push(Partition {
            values,
            batch: taken.project(&data_columns)?,
        });
    }
    Ok(partitions)
}

/// Parses the `column=value` segments of a path relative to the table root.
pub fn parse_relative_dir(relative: &Path) -> Result<Vec<(String, Option<String>)>, StoreError> {
    let mut values = Vec::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            return Err(StoreError::Partition(format!(
                "unexpected path component in {:?}",
                relative
            )));
        };
        let part = part.to_string_lossy();
        let (column, raw) = part.split_once('=').ok_or_else(|| {
            StoreError::Partition(format!("'{part}' is not a column=value directory"))
        })?;
        let value = if raw == DEFAULT_PARTITION {
            None
        } else {
            Some(
                urlencoding::decode(raw)
                    .map_err(|e| StoreError::Partition(format!("bad encoding in '{part}': {e}")))?
                    .into_owned(),
            )
        };
        values.push((column.to_string(), value));
    }
    Ok(values)
}

/// Appends the partition columns to a batch read from one partition file,
/// typed after `table_schema`.
pub fn restore_columns(
    batch: RecordBatch,
    values: &[(String, Option<String>)],
    table_schema: &Schema,
) -> Result<RecordBatch, StoreError> {
    let rows = batch.num_rows();
    let mut fields: Vec<Arc<Field>> = batch.schema().fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    for (name, value) in values {
        let field = table_schema
            .field_with_name(name)
            .map_err(|_| StoreError::Partition(format!("unknown partition column '{name}'")))?;
        let column = match value {
            Some(v) => {
                let strings: ArrayRef = Arc::new(StringArray::from(vec![v.as_str(); rows]));
                let options = CastOptions {
                    safe: false,
                    ..Default::default()
                };
                cast_with_options(&strings, field.data_type(), &options).map_err(|e| {
                    StoreError::Partition(format!("cannot read '{v}' as {name}: {e}"))
                })?
            }
            None => new_null_array(field.data_type(), rows),
        };
        fields.push(Arc::new(field.clone().with_nullable(value.is_none() || field.is_nullable())));
        columns.push(column);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
