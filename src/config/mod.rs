mod file_config;

pub use file_config::{FileConfig, PipelineConfig, StorageConfig};

use crate::records::RecordPolicy;
use crate::transform::{DedupPolicy, JoinKey, JoinMode};
use crate::warehouse::WriteMode;
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_SONG_DATA_DIR: &str = "song_data";
pub const DEFAULT_LOG_DATA_DIR: &str = "log_data";
pub const DEFAULT_PLAY_PAGE: &str = "NextSong";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub input_root: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub record_policy: RecordPolicy,
    pub join_key: JoinKey,
    pub join_mode: JoinMode,
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageSettings,
    pub pipeline: PipelineSettings,
}

/// Where records are read from and tables are written to.
///
/// Handed explicitly to every component that opens storage; nothing is
/// exported to the process environment.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub endpoint: Option<String>,
    pub credentials: Option<StorageCredentials>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl StorageSettings {
    /// Fails unless these settings describe the local filesystem.
    pub fn ensure_local(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            bail!(
                "Storage endpoint {} is not supported, only local filesystem paths are",
                endpoint
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub song_data_dir: String,
    pub log_data_dir: String,
    pub play_page: String,
    pub record_policy: RecordPolicy,
    pub song_dedup: DedupPolicy,
    pub artist_dedup: DedupPolicy,
    pub user_dedup: DedupPolicy,
    pub join_key: JoinKey,
    pub join_mode: JoinMode,
    pub persist_time_table: bool,
    pub partition_songplays: bool,
    pub write_mode: WriteMode,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            song_data_dir: DEFAULT_SONG_DATA_DIR.to_string(),
            log_data_dir: DEFAULT_LOG_DATA_DIR.to_string(),
            play_page: DEFAULT_PLAY_PAGE.to_string(),
            record_policy: RecordPolicy::default(),
            song_dedup: DedupPolicy::LastWins,
            artist_dedup: DedupPolicy::LastWins,
            user_dedup: DedupPolicy::LastWins,
            join_key: JoinKey::default(),
            join_mode: JoinMode::default(),
            persist_time_table: true,
            partition_songplays: false,
            write_mode: WriteMode::default(),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let storage_file = file.storage.unwrap_or_default();
        let pipeline_file = file.pipeline.unwrap_or_default();

        let input_root = storage_file
            .input_root
            .map(PathBuf::from)
            .or_else(|| cli.input_root.clone())
            .ok_or_else(|| {
                anyhow!("input_root must be specified via --input-root or in config file")
            })?;
        let output_root = storage_file
            .output_root
            .map(PathBuf::from)
            .or_else(|| cli.output_root.clone())
            .ok_or_else(|| {
                anyhow!("output_root must be specified via --output-root or in config file")
            })?;

        for root in [&input_root, &output_root] {
            if root.to_string_lossy().contains("://") {
                bail!(
                    "Remote storage locations are not supported, got {:?}",
                    root
                );
            }
        }
        if !input_root.is_dir() {
            bail!("Input root does not exist or is not a directory: {:?}", input_root);
        }
        if output_root.exists() && !output_root.is_dir() {
            bail!("output_root is not a directory: {:?}", output_root);
        }

        let credentials = match (storage_file.access_key_id, storage_file.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StorageCredentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            _ => bail!("Both access_key_id and secret_access_key must be provided together"),
        };

        let storage = StorageSettings {
            input_root,
            output_root,
            endpoint: storage_file.endpoint,
            credentials,
        };

        let defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            song_data_dir: pipeline_file
                .song_data_dir
                .unwrap_or(defaults.song_data_dir),
            log_data_dir: pipeline_file.log_data_dir.unwrap_or(defaults.log_data_dir),
            play_page: pipeline_file.play_page.unwrap_or(defaults.play_page),
            record_policy: parse_option(pipeline_file.record_policy, "record_policy")?
                .unwrap_or(cli.record_policy),
            song_dedup: parse_option(pipeline_file.song_dedup, "song_dedup")?
                .unwrap_or(defaults.song_dedup),
            artist_dedup: parse_option(pipeline_file.artist_dedup, "artist_dedup")?
                .unwrap_or(defaults.artist_dedup),
            user_dedup: parse_option(pipeline_file.user_dedup, "user_dedup")?
                .unwrap_or(defaults.user_dedup),
            join_key: parse_option(pipeline_file.join_key, "join_key")?.unwrap_or(cli.join_key),
            join_mode: parse_option(pipeline_file.join_mode, "join_mode")?
                .unwrap_or(cli.join_mode),
            persist_time_table: pipeline_file
                .persist_time_table
                .unwrap_or(defaults.persist_time_table),
            partition_songplays: pipeline_file
                .partition_songplays
                .unwrap_or(defaults.partition_songplays),
            write_mode: parse_option(pipeline_file.write_mode, "write_mode")?
                .unwrap_or(cli.write_mode),
        };

        Ok(Self { storage, pipeline })
    }
}

/// Parses an enum option from its TOML string using clap's ValueEnum names.
/// Unknown values are an error rather than a silent fallback.
fn parse_option<T: ValueEnum>(value: Option<String>, key: &str) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(s) => T::from_str(&s, true)
            .map(Some)
            .map_err(|_| anyhow!("Invalid value {:?} for {}", s, key)),
    }
}
