//! Arrow schemas of the five warehouse tables and row <-> batch conversion.
//!
//! These schemas are the contract for downstream readers of the Parquet
//! output. Partition columns are part of the schema here but live only in
//! the directory path on disk, see [`super::partition`].

use super::models::{ArtistDim, PlayFact, SongDim, TimeDim, UserDim};
use super::StoreError;
use arrow::array::{
    Array, ArrayRef, Float64Array, Int32Array, Int64Array, StringArray,
    TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDateTime};
use std::sync::Arc;

pub const SONGS_TABLE: &str = "songs";
pub const ARTISTS_TABLE: &str = "artists";
pub const USERS_TABLE: &str = "users";
pub const TIME_TABLE: &str = "time";
pub const SONGPLAYS_TABLE: &str = "songplays";

/// Name, schema and physical partitioning of one output table.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub name: &'static str,
    pub schema: SchemaRef,
    pub partition_by: Vec<&'static str>,
}

impl TableLayout {
    pub fn is_partitioned(&self) -> bool {
        !self.partition_by.is_empty()
    }
}

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, None)
}

pub fn songs_layout() -> TableLayout {
    TableLayout {
        name: SONGS_TABLE,
        schema: Arc::new(Schema::new(vec![
            Field::new("song_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("duration", DataType::Float64, false),
        ])),
        partition_by: vec!["year", "artist_id"],
    }
}

pub fn artists_layout() -> TableLayout {
    TableLayout {
        name: ARTISTS_TABLE,
        schema: Arc::new(Schema::new(vec![
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("location", DataType::Utf8, true),
            Field::new("latitude", DataType::Float64, true),
            Field::new("longitude", DataType::Float64, true),
        ])),
        partition_by: vec![],
    }
}

pub fn users_layout() -> TableLayout {
    TableLayout {
        name: USERS_TABLE,
        schema: Arc::new(Schema::new(vec![
            Field::new("user_id", DataType::Utf8, false),
            Field::new("first_name", DataType::Utf8, true),
            Field::new("last_name", DataType::Utf8, true),
            Field::new("gender", DataType::Utf8, true),
            Field::new("level", DataType::Utf8, false),
        ])),
        partition_by: vec![],
    }
}

pub fn time_layout() -> TableLayout {
    TableLayout {
        name: TIME_TABLE,
        schema: Arc::new(Schema::new(vec![
            Field::new("start_time", timestamp_type(), false),
            Field::new("hour", DataType::Int32, false),
            Field::new("day", DataType::Int32, false),
            Field::new("week_of_year", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
            Field::new("year", DataType::Int32, false),
            Field::new("weekday", DataType::Int32, false),
        ])),
        partition_by: vec!["year", "month"],
    }
}

/// With `partitioned`, year and month columns derived from the event
/// timestamp are added and used as partition keys.
pub fn songplays_layout(partitioned: bool) -> TableLayout {
    let mut fields = vec![
        Field::new("event_timestamp", timestamp_type(), false),
        Field::new("user_id", DataType::Utf8, false),
        Field::new("level", DataType::Utf8, false),
        Field::new("song_id", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("session_id", DataType::Int64, false),
        Field::new("location", DataType::Utf8, true),
        Field::new("user_agent", DataType::Utf8, true),
    ];
    let mut partition_by = vec![];
    if partitioned {
        fields.push(Field::new("year", DataType::Int32, false));
        fields.push(Field::new("month", DataType::Int32, false));
        partition_by = vec!["year", "month"];
    }
    TableLayout {
        name: SONGPLAYS_TABLE,
        schema: Arc::new(Schema::new(fields)),
        partition_by,
    }
}

// ============================================================================
// Rows -> batches
// ============================================================================

fn strings<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from(values.map(Some).collect::<Vec<_>>()))
}

fn opt_strings<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(StringArray::from(values.collect::<Vec<_>>()))
}

fn timestamps(values: impl Iterator<Item = NaiveDateTime>) -> ArrayRef {
    Arc::new(TimestampMillisecondArray::from(
        values
            .map(|t| t.and_utc().timestamp_millis())
            .collect::<Vec<_>>(),
    ))
}

pub fn songs_batch(rows: &[SongDim]) -> Result<RecordBatch, StoreError> {
    let columns: Vec<ArrayRef> = vec![
        strings(rows.iter().map(|r| r.song_id.as_str())),
        strings(rows.iter().map(|r| r.title.as_str())),
        strings(rows.iter().map(|r| r.artist_id.as_str())),
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.duration))),
    ];
    Ok(RecordBatch::try_new(songs_layout().schema, columns)?)
}

pub fn artists_batch(rows: &[ArtistDim]) -> Result<RecordBatch, StoreError> {
    let columns: Vec<ArrayRef> = vec![
        strings(rows.iter().map(|r| r.artist_id.as_str())),
        opt_strings(rows.iter().map(|r| r.name.as_deref())),
        opt_strings(rows.iter().map(|r| r.location.as_deref())),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.latitude).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.longitude).collect::<Vec<_>>(),
        )),
    ];
    Ok(RecordBatch::try_new(artists_layout().schema, columns)?)
}

pub fn users_batch(rows: &[UserDim]) -> Result<RecordBatch, StoreError> {
    let columns: Vec<ArrayRef> = vec![
        strings(rows.iter().map(|r| r.user_id.as_str())),
        opt_strings(rows.iter().map(|r| r.first_name.as_deref())),
        opt_strings(rows.iter().map(|r| r.last_name.as_deref())),
        opt_strings(rows.iter().map(|r| r.gender.as_deref())),
        strings(rows.iter().map(|r| r.level.as_str())),
    ];
    Ok(RecordBatch::try_new(users_layout().schema, columns)?)
}

pub fn time_batch(rows: &[TimeDim]) -> Result<RecordBatch, StoreError> {
    let int_col = |f: fn(&TimeDim) -> i32| -> ArrayRef {
        Arc::new(Int32Array::from_iter_values(rows.iter().map(f)))
    };
    let columns: Vec<ArrayRef> = vec![
        timestamps(rows.iter().map(|r| r.start_time)),
        int_col(|r| r.hour),
        int_col(|r| r.day),
        int_col(|r| r.week_of_year),
        int_col(|r| r.month),
        int_col(|r| r.year),
        int_col(|r| r.weekday),
    ];
    Ok(RecordBatch::try_new(time_layout().schema, columns)?)
}

pub fn songplays_batch(rows: &[PlayFact], partitioned: bool) -> Result<RecordBatch, StoreError> {
    let mut columns: Vec<ArrayRef> = vec![
        timestamps(rows.iter().map(|r| r.event_timestamp)),
        strings(rows.iter().map(|r| r.user_id.as_str())),
        strings(rows.iter().map(|r| r.level.as_str())),
        opt_strings(rows.iter().map(|r| r.song_id.as_deref())),
        opt_strings(rows.iter().map(|r| r.artist_id.as_deref())),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.session_id))),
        opt_strings(rows.iter().map(|r| r.location.as_deref())),
        opt_strings(rows.iter().map(|r| r.user_agent.as_deref())),
    ];
    if partitioned {
        columns.push(Arc::new(Int32Array::from_iter_values(
            rows.iter().map(|r| r.event_timestamp.year()),
        )));
        columns.push(Arc::new(Int32Array::from_iter_values(
            rows.iter().map(|r| r.event_timestamp.month() as i32),
        )));
    }
    Ok(RecordBatch::try_new(songplays_layout(partitioned).schema, columns)?)
}

// ============================================================================
// Batches -> rows
// ============================================================================

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a T, StoreError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::Schema(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| StoreError::Schema(format!("column '{name}' has unexpected type")))
}

fn opt_string(array: &StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}

fn opt_f64(array: &Float64Array, row: usize) -> Option<f64> {
    (!array.is_null(row)).then(|| array.value(row))
}

fn naive(array: &TimestampMillisecondArray, row: usize) -> Result<NaiveDateTime, StoreError> {
    array
        .value_as_datetime(row)
        .ok_or_else(|| StoreError::Schema(format!("timestamp out of range at row {row}")))
}

pub fn songs_from_batches(batches: &[RecordBatch]) -> Result<Vec<SongDim>, StoreError> {
    let mut out = Vec::new();
    for batch in batches {
        let song_id = column::<StringArray>(batch, "song_id")?;
        let title = column::<StringArray>(batch, "title")?;
        let artist_id = column::<StringArray>(batch, "artist_id")?;
        let year = column::<Int32Array>(batch, "year")?;
        let duration = column::<Float64Array>(batch, "duration")?;
        for row in 0..batch.num_rows() {
            out.push(SongDim {
                song_id: song_id.value(row).to_string(),
                title: title.value(row).to_string(),
                artist_id: artist_id.value(row).to_string(),
                year: year.value(row),
                duration: duration.value(row),
            });
        }
    }
    Ok(out)
}

pub fn artists_from_batches(batches: &[RecordBatch]) -> Result<Vec<ArtistDim>, StoreError> {
    let mut out = Vec::new();
    for batch in batches {
        let artist_id = column::<StringArray>(batch, "artist_id")?;
        let name = column::<StringArray>(batch, "name")?;
        let location = column::<StringArray>(batch, "location")?;
        let latitude = column::<Float64Array>(batch, "latitude")?;
        let longitude = column::<Float64Array>(batch, "longitude")?;
        for row in 0..batch.num_rows() {
            out.push(ArtistDim {
                artist_id: artist_id.value(row).to_string(),
                name: opt_string(name, row),
                location: opt_string(location, row),
                latitude: opt_f64(latitude, row),
                longitude: opt_f64(longitude, row),
            });
        }
    }
    Ok(out)
}

pub fn users_from_batches(batches: &[RecordBatch]) -> Result<Vec<UserDim>, StoreError> {
    let mut out = Vec::new();
    for batch in batches {
        let user_id = column::<StringArray>(batch, "user_id")?;
        let first_name = column::<StringArray>(batch, "first_name")?;
        let last_name = column::<StringArray>(batch, "last_name")?;
        let gender = column::<StringArray>(batch, "gender")?;
        let level = column::<StringArray>(batch, "level")?;
        for row in 0..batch.num_rows() {
            out.push(UserDim {
                user_id: user_id.value(row).to_string(),
                first_name: opt_string(first_name, row),
                last_name: opt_string(last_name, row),
                gender: opt_string(gender, row),
                level: level.value(row).to_string(),
            });
        }
    }
    Ok(out)
}

pub fn time_from_batches(batches: &[RecordBatch]) -> Result<Vec<TimeDim>, StoreError> {
    let mut out = Vec::new();
    for batch in batches {
        let start_time = column::<TimestampMillisecondArray>(batch, "start_time")?;
        let hour = column::<Int32Array>(batch, "hour")?;
        let day = column::<Int32Array>(batch, "day")?;
        let week_of_year = column::<Int32Array>(batch, "week_of_year")?;
        let month = column::<Int32Array>(batch, "month")?;
        let year = column::<Int32Array>(batch, "year")?;
        let weekday = column::<Int32Array>(batch, "weekday")?;
        for row in 0..batch.num_rows() {
            out.push(TimeDim {
                start_time: naive(start_time, row)?,
                hour: hour.value(row),
                day: day.value(row),
                week_of_year: week_of_year.value(row),
                month: month.value(row),
                year: year.value(row),
                weekday: weekday.value(row),
            });
        }
    }
    Ok(out)
}

pub fn songplays_from_batches(batches: &[RecordBatch]) -> Result<Vec<PlayFact>, StoreError> {
    let mut out = Vec::new();
    for batch in batches {
        let event_timestamp = column::<TimestampMillisecondArray>(batch, "event_timestamp")?;
        let user_id = column::<StringArray>(batch, "user_id")?;
        let level = column::<StringArray>(batch, "level")?;
        let song_id = column::<StringArray>(batch, "song_id")?;
        let artist_id = column::<StringArray>(batch, "artist_id")?;
        let session_id = column::<Int64Array>(batch, "session_id")?;
        let location = column::<StringArray>(batch, "location")?;
        let user_agent = column::<StringArray>(batch, "user_agent")?;
        for row in 0..batch.num_rows() {
            out.push(PlayFact {
                event_timestamp: naive(event_timestamp, row)?,
                user_id: user_id.value(row).to_string(),
                level: level.value(row).to_string(),
                song_id: opt_string(song_id, row),
                artist_id: opt_string(artist_id, row),
                session_id: session_id.value(row),
                location: opt_string(location, row),
                user_agent: opt_string(user_agent, row),
            });
        }
    }
    Ok(out)
}
