use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub storage: Option<StorageConfig>,
    pub pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub input_root: Option<String>,
    pub output_root: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Song metadata directory, relative to input_root. Walked recursively.
    pub song_data_dir: Option<String>,
    /// Event log directory, relative to input_root. Read flat.
    pub log_data_dir: Option<String>,
    /// Value of `page` that marks a play event.
    pub play_page: Option<String>,
    /// "strict" or "lenient"
    pub record_policy: Option<String>,
    /// "keep_all", "first_wins" or "last_wins"
    pub song_dedup: Option<String>,
    pub artist_dedup: Option<String>,
    pub user_dedup: Option<String>,
    /// "title" or "title_and_artist"
    pub join_key: Option<String>,
    /// "left" or "inner"
    pub join_mode: Option<String>,
    pub persist_time_table: Option<bool>,
    pub partition_songplays: Option<bool>,
    /// "overwrite" or "append"
    pub write_mode: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
