//! Runs the two warehouse steps in order.
//!
//! The catalog step writes the song and artist tables. The event step then
//! reads both back from the store before it resolves any play, so a play
//! fact can only ever reference song rows that were durably written.

use crate::config::PipelineSettings;
use crate::source::RecordSource;
use crate::transform::{
    build_plays, build_time, build_users, filter_plays, transform_catalog, DedupPolicy,
    SongIndex,
};
use crate::warehouse::tables::{
    artists_batch, artists_from_batches, artists_layout, songplays_batch, songplays_layout,
    songs_batch, songs_from_batches, songs_layout, time_batch, time_layout, users_batch,
    users_layout,
};
use crate::warehouse::{StoreError, TableLayout, WarehouseStore, WriteReport};
use arrow::record_batch::RecordBatch;
use std::error::Error;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    ReadMetadata,
    WriteSongs,
    WriteArtists,
    ReadEvents,
    FilterPlays,
    ReadCatalog,
    WriteUsers,
    WriteTime,
    WriteSongplays,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::ReadMetadata => "read song metadata",
            PipelineStep::WriteSongs => "write songs table",
            PipelineStep::WriteArtists => "write artists table",
            PipelineStep::ReadEvents => "read event log",
            PipelineStep::FilterPlays => "filter play events",
            PipelineStep::ReadCatalog => "read back catalog tables",
            PipelineStep::WriteUsers => "write users table",
            PipelineStep::WriteTime => "write time table",
            PipelineStep::WriteSongplays => "write songplays table",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("Pipeline step '{step}' failed: {source}")]
pub struct PipelineError {
    pub step: PipelineStep,
    #[source]
    pub source: Box<dyn Error + Send + Sync>,
}

trait AtStep<T> {
    fn at(self, step: PipelineStep) -> Result<T, PipelineError>;
}

impl<T, E> AtStep<T> for Result<T, E>
where
    E: Into<Box<dyn Error + Send + Sync>>,
{
    fn at(self, step: PipelineStep) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError {
            step,
            source: e.into(),
        })
    }
}

/// Counters of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub metadata_records: usize,
    pub metadata_skipped: usize,
    pub event_records: usize,
    pub events_skipped: usize,
    pub plays: usize,
    pub plays_skipped: usize,
    /// Plays that matched no song, whether kept or dropped.
    pub join_misses: usize,
    pub tables: Vec<WriteReport>,
}

impl RunSummary {
    /// Rows written to `table`, if it was written in this run.
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|r| r.table == table).map(|r| r.rows)
    }
}

pub struct Pipeline<'a> {
    settings: &'a PipelineSettings,
    source: &'a dyn RecordSource,
    store: &'a dyn WarehouseStore,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a PipelineSettings,
        source: &'a dyn RecordSource,
        store: &'a dyn WarehouseStore,
    ) -> Self {
        Self {
            settings,
            source,
            store,
        }
    }

    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        self.run_catalog(&mut summary)?;
        self.run_events(&mut summary)?;
        Ok(summary)
    }

    fn run_catalog(&self, summary: &mut RunSummary) -> Result<(), PipelineError> {
        info!("Reading song metadata...");
        let metadata = self
            .source
            .metadata_records()
            .at(PipelineStep::ReadMetadata)?;
        summary.metadata_records = metadata.len();
        summary.metadata_skipped = metadata.skipped;

        let catalog = transform_catalog(
            &metadata.records,
            self.settings.song_dedup,
            self.settings.artist_dedup,
        );

        summary.tables.push(
            self.write(&songs_layout(), songs_batch(&catalog.songs))
                .at(PipelineStep::WriteSongs)?,
        );
        summary.tables.push(
            self.write(&artists_layout(), artists_batch(&catalog.artists))
                .at(PipelineStep::WriteArtists)?,
        );
        Ok(())
    }

    fn run_events(&self, summary: &mut RunSummary) -> Result<(), PipelineError> {
        info!("Reading event log...");
        let events = self.source.event_records().at(PipelineStep::ReadEvents)?;
        summary.event_records = events.len();
        summary.events_skipped = events.skipped;

        let filtered = filter_plays(
            &events.records,
            &self.settings.play_page,
            self.settings.record_policy,
        )
        .at(PipelineStep::FilterPlays)?;
        summary.plays = filtered.plays.len();
        summary.plays_skipped = filtered.skipped;
        debug!(
            "{} of {} events are '{}' plays",
            filtered.plays.len(),
            events.len(),
            self.settings.play_page
        );

        let users = build_users(&filtered.plays, self.settings.user_dedup);
        summary.tables.push(
            self.write(&users_layout(), users_batch(&users))
                .at(PipelineStep::WriteUsers)?,
        );

        if self.settings.persist_time_table {
            let time = build_time(&filtered.plays);
            summary.tables.push(
                self.write(&time_layout(), time_batch(&time))
                    .at(PipelineStep::WriteTime)?,
            );
        }

        let songs = self
            .store
            .read_table(&songs_layout())
            .and_then(|b| songs_from_batches(&b))
            .at(PipelineStep::ReadCatalog)?;
        let artists = self
            .store
            .read_table(&artists_layout())
            .and_then(|b| artists_from_batches(&b))
            .at(PipelineStep::ReadCatalog)?;
        // Appended runs leave one copy of a song per run in the table
        let songs = catalog_dedup(self.settings.song_dedup).apply(songs, |s| s.song_id.clone());
        let artists =
            catalog_dedup(self.settings.artist_dedup).apply(artists, |a| a.artist_id.clone());
        let index = SongIndex::new(&songs, &artists, self.settings.join_key);

        let joined = build_plays(&filtered.plays, &index, self.settings.join_mode);
        summary.join_misses = joined.misses;
        if joined.misses > 0 {
            info!(
                "{} plays matched no song ({:?} join)",
                joined.misses, self.settings.join_mode
            );
        }

        let partitioned = self.settings.partition_songplays;
        summary.tables.push(
            self.write(
                &songplays_layout(partitioned),
                songplays_batch(&joined.facts, partitioned),
            )
            .at(PipelineStep::WriteSongplays)?,
        );
        Ok(())
    }

    fn write(
        &self,
        layout: &TableLayout,
        batch: Result<RecordBatch, StoreError>,
    ) -> Result<WriteReport, StoreError> {
        self.store.write_table(layout, &batch?)
    }
}

/// Collapse applied to the catalog read back for the join. A song id must
/// resolve to a single row there even when the table keeps every copy.
fn catalog_dedup(policy: DedupPolicy) -> DedupPolicy {
    match policy {
        DedupPolicy::KeepAll => DedupPolicy::LastWins,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{EventRecord, MetadataRecord, RecordPolicy};
    use crate::source::{SourceBatch, SourceError};
    use crate::transform::JoinMode;
    use crate::warehouse::tables::{SONGPLAYS_TABLE, SONGS_TABLE, TIME_TABLE, USERS_TABLE};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemorySource {
        metadata: Vec<&'static str>,
        events: Vec<&'static str>,
    }

    impl RecordSource for MemorySource {
        fn metadata_records(&self) -> Result<SourceBatch<MetadataRecord>, SourceError> {
            Ok(SourceBatch {
                records: self
                    .metadata
                    .iter()
                    .map(|l| MetadataRecord::parse(l).unwrap())
                    .collect(),
                skipped: 0,
            })
        }

        fn event_records(&self) -> Result<SourceBatch<EventRecord>, SourceError> {
            Ok(SourceBatch {
                records: self
                    .events
                    .iter()
                    .map(|l| EventRecord::parse(l).unwrap())
                    .collect(),
                skipped: 0,
            })
        }
    }

    /// Keeps written batches in memory and records the order of calls.
    #[derive(Default)]
    struct MemoryStore {
        tables: Mutex<HashMap<String, RecordBatch>>,
        calls: Mutex<Vec<String>>,
    }

    impl WarehouseStore for MemoryStore {
        fn write_table(
            &self,
            layout: &TableLayout,
            batch: &RecordBatch,
        ) -> Result<WriteReport, StoreError> {
            self.calls.lock().unwrap().push(format!("write {}", layout.name));
            self.tables
                .lock()
                .unwrap()
                .insert(layout.name.to_string(), batch.clone());
            Ok(WriteReport {
                table: layout.name.to_string(),
                rows: batch.num_rows(),
                files: 1,
                partitions: 0,
            })
        }

        fn read_table(&self, layout: &TableLayout) -> Result<Vec<RecordBatch>, StoreError> {
            self.calls.lock().unwrap().push(format!("read {}", layout.name));
            self.tables
                .lock()
                .unwrap()
                .get(layout.name)
                .map(|b| vec![b.clone()])
                .ok_or_else(|| StoreError::Incomplete(layout.name.to_string()))
        }
    }

    const SONG: &str = r#"{"song_id":"S1","title":"Test Song","artist_id":"A1","artist_name":"Band","year":2000,"duration":180.0}"#;
    const PLAY: &str = r#"{"page":"NextSong","userId":"U1","firstName":"Ann","level":"free","ts":946684800000,"sessionId":1,"song":"Test Song","artist":"Band"}"#;
    const MISS: &str = r#"{"page":"NextSong","userId":"U2","level":"paid","ts":946684801000,"sessionId":2,"song":"Unknown"}"#;
    const HOME: &str = r#"{"page":"Home","userId":"U3"}"#;

    #[test]
    fn catalog_is_written_before_it_is_read_back() {
        let source = MemorySource {
            metadata: vec![SONG],
            events: vec![PLAY, HOME],
        };
        let store = MemoryStore::default();
        let settings = PipelineSettings::default();

        let summary = Pipeline::new(&settings, &source, &store).run().unwrap();

        let calls = store.calls.lock().unwrap().clone();
        let written = calls.iter().position(|c| c == "write songs").unwrap();
        let read = calls.iter().position(|c| c == "read songs").unwrap();
        assert!(written < read);

        assert_eq!(summary.rows(SONGS_TABLE), Some(1));
        assert_eq!(summary.rows(USERS_TABLE), Some(1));
        assert_eq!(summary.rows(TIME_TABLE), Some(1));
        assert_eq!(summary.rows(SONGPLAYS_TABLE), Some(1));
        assert_eq!(summary.event_records, 2);
        assert_eq!(summary.plays, 1);
        assert_eq!(summary.join_misses, 0);
    }

    #[test]
    fn time_table_can_be_skipped() {
        let source = MemorySource {
            metadata: vec![SONG],
            events: vec![PLAY],
        };
        let store = MemoryStore::default();
        let settings = PipelineSettings {
            persist_time_table: false,
            ..Default::default()
        };

        let summary = Pipeline::new(&settings, &source, &store).run().unwrap();
        assert_eq!(summary.rows(TIME_TABLE), None);
    }

    #[test]
    fn inner_join_counts_misses_and_drops_them() {
        let source = MemorySource {
            metadata: vec![SONG],
            events: vec![PLAY, MISS],
        };
        let store = MemoryStore::default();
        let settings = PipelineSettings {
            join_mode: JoinMode::Inner,
            ..Default::default()
        };

        let summary = Pipeline::new(&settings, &source, &store).run().unwrap();
        assert_eq!(summary.join_misses, 1);
        assert_eq!(summary.rows(SONGPLAYS_TABLE), Some(1));
        assert_eq!(summary.rows(USERS_TABLE), Some(2));
    }

    #[test]
    fn strict_failure_names_the_step() {
        let source = MemorySource {
            metadata: vec![SONG],
            events: vec![r#"{"page":"NextSong","userId":"U1","ts":1}"#],
        };
        let store = MemoryStore::default();
        let settings = PipelineSettings {
            record_policy: RecordPolicy::Strict,
            ..Default::default()
        };

        let err = Pipeline::new(&settings, &source, &store).run().unwrap_err();
        assert_eq!(err.step, PipelineStep::FilterPlays);
        assert!(err.to_string().contains("filter play events"));
    }

    #[test]
    fn missing_catalog_fails_the_event_step() {
        struct ForgetfulStore(MemoryStore);
        impl WarehouseStore for ForgetfulStore {
            fn write_table(
                &self,
                layout: &TableLayout,
                batch: &RecordBatch,
            ) -> Result<WriteReport, StoreError> {
                self.0.write_table(layout, batch)
            }
            fn read_table(&self, layout: &TableLayout) -> Result<Vec<RecordBatch>, StoreError> {
                Err(StoreError::Incomplete(layout.name.to_string()))
            }
        }

        let source = MemorySource {
            metadata: vec![SONG],
            events: vec![PLAY],
        };
        let store = ForgetfulStore(MemoryStore::default());
        let settings = PipelineSettings::default();

        let err = Pipeline::new(&settings, &source, &store).run().unwrap_err();
        assert_eq!(err.step, PipelineStep::ReadCatalog);
    }

    #[test]
    fn repeated_catalog_rows_match_once() {
        struct RepeatingStore(MemoryStore);
        impl WarehouseStore for RepeatingStore {
            fn write_table(
                &self,
                layout: &TableLayout,
                batch: &RecordBatch,
            ) -> Result<WriteReport, StoreError> {
                self.0.write_table(layout, batch)
            }
            fn read_table(&self, layout: &TableLayout) -> Result<Vec<RecordBatch>, StoreError> {
                let batches = self.0.read_table(layout)?;
                Ok(batches.iter().chain(batches.iter()).cloned().collect())
            }
        }

        let source = MemorySource {
            metadata: vec![SONG],
            events: vec![PLAY],
        };
        for song_dedup in [DedupPolicy::LastWins, DedupPolicy::KeepAll] {
            let store = RepeatingStore(MemoryStore::default());
            let settings = PipelineSettings {
                song_dedup,
                artist_dedup: song_dedup,
                join_key: crate::transform::JoinKey::TitleAndArtist,
                ..Default::default()
            };

            let summary = Pipeline::new(&settings, &source, &store).run().unwrap();
            assert_eq!(summary.rows(SONGPLAYS_TABLE), Some(1), "{:?}", song_dedup);
        }
    }
}
