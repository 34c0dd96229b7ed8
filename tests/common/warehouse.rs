//! A temporary input corpus plus output directory.

use pezzottify_warehouse::config::{PipelineSettings, StorageSettings};
use pezzottify_warehouse::warehouse::models::{ArtistDim, PlayFact, SongDim, TimeDim, UserDim};
use pezzottify_warehouse::warehouse::tables::{
    artists_from_batches, artists_layout, songplays_from_batches, songplays_layout,
    songs_from_batches, songs_layout, time_from_batches, time_layout, users_from_batches,
    users_layout,
};
use pezzottify_warehouse::{
    FsRecordSource, ParquetWarehouseStore, Pipeline, PipelineError, RunSummary, WarehouseStore,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestWarehouse {
    _dir: TempDir,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
}

impl TestWarehouse {
    /// Writes each metadata line to its own file, nested the way the song
    /// corpus is, and all event lines to a single log file.
    pub fn with_input(songs: &[String], events: &[String]) -> Self {
        let dir = TempDir::new().unwrap();
        let input_root = dir.path().join("input");
        let output_root = dir.path().join("output");

        let song_data = input_root.join("song_data");
        for (i, line) in songs.iter().enumerate() {
            let nested = song_data.join("A").join(format!("{}", (b'A' + (i % 26) as u8) as char));
            fs::create_dir_all(&nested).unwrap();
            fs::write(nested.join(format!("TRAAA{i:04}.json")), line).unwrap();
        }
        fs::create_dir_all(&song_data).unwrap();

        let log_data = input_root.join("log_data");
        fs::create_dir_all(&log_data).unwrap();
        fs::write(log_data.join("2000-01-events.json"), events.join("\n")).unwrap();

        Self {
            _dir: dir,
            input_root,
            output_root,
        }
    }

    /// Adds another event log file.
    pub fn add_log_file(&self, name: &str, events: &[String]) {
        fs::write(self.input_root.join("log_data").join(name), events.join("\n")).unwrap();
    }

    /// Replaces the event log with new content.
    pub fn replace_events(&self, events: &[String]) {
        self.add_log_file("2000-01-events.json", events);
    }

    pub fn storage(&self) -> StorageSettings {
        StorageSettings {
            input_root: self.input_root.clone(),
            output_root: self.output_root.clone(),
            endpoint: None,
            credentials: None,
        }
    }

    pub fn run(&self, settings: &PipelineSettings) -> Result<RunSummary, PipelineError> {
        let storage = self.storage();
        let source = FsRecordSource::open(
            &storage,
            &settings.song_data_dir,
            &settings.log_data_dir,
            settings.record_policy,
        )
        .unwrap();
        let store = ParquetWarehouseStore::open(&storage, settings.write_mode).unwrap();
        Pipeline::new(settings, &source, &store).run()
    }

    pub fn run_default(&self) -> Result<RunSummary, PipelineError> {
        self.run(&PipelineSettings::default())
    }

    pub fn store(&self) -> ParquetWarehouseStore {
        ParquetWarehouseStore::at_root(&self.output_root, Default::default())
    }

    pub fn table_path(&self, relative: &str) -> PathBuf {
        self.output_root.join(relative)
    }

    pub fn songs(&self) -> Vec<SongDim> {
        songs_from_batches(&self.store().read_table(&songs_layout()).unwrap()).unwrap()
    }

    pub fn artists(&self) -> Vec<ArtistDim> {
        artists_from_batches(&self.store().read_table(&artists_layout()).unwrap()).unwrap()
    }

    pub fn users(&self) -> Vec<UserDim> {
        users_from_batches(&self.store().read_table(&users_layout()).unwrap()).unwrap()
    }

    pub fn time(&self) -> Vec<TimeDim> {
        time_from_batches(&self.store().read_table(&time_layout()).unwrap()).unwrap()
    }

    pub fn songplays(&self, partitioned: bool) -> Vec<PlayFact> {
        let layout = songplays_layout(partitioned);
        songplays_from_batches(&self.store().read_table(&layout).unwrap()).unwrap()
    }
}
