use anyhow::{Context, Result};
use clap::Parser;
use pezzottify_warehouse::config::{AppConfig, CliConfig, FileConfig};
use pezzottify_warehouse::transform::{JoinKey, JoinMode};
use pezzottify_warehouse::{
    FsRecordSource, ParquetWarehouseStore, Pipeline, RecordPolicy, WriteMode,
};
use std::path::PathBuf;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "warehouse-etl")]
#[command(about = "Build the song play warehouse from metadata and event logs")]
struct CliArgs {
    /// Directory holding the song_data/ and log_data/ corpora.
    #[clap(long, value_parser = parse_path)]
    pub input_root: Option<PathBuf>,

    /// Directory the warehouse tables are written to.
    #[clap(long, value_parser = parse_path)]
    pub output_root: Option<PathBuf>,

    /// Path to a TOML config file. Values in it override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// What to do with malformed input records.
    #[clap(long, value_enum, default_value_t = RecordPolicy::default())]
    pub record_policy: RecordPolicy,

    /// Event fields used to resolve the played song.
    #[clap(long, value_enum, default_value_t = JoinKey::default())]
    pub join_key: JoinKey,

    /// Whether plays with no matching song are kept.
    #[clap(long, value_enum, default_value_t = JoinMode::default())]
    pub join_mode: JoinMode,

    /// How output of previous runs is treated.
    #[clap(long, value_enum, default_value_t = WriteMode::default())]
    pub write_mode: WriteMode,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            input_root: self.input_root.clone(),
            output_root: self.output_root.clone(),
            record_policy: self.record_policy,
            join_key: self.join_key,
            join_mode: self.join_mode,
            write_mode: self.write_mode,
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    info!("warehouse-etl {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;
    info!("Input root: {:?}", config.storage.input_root);
    info!("Output root: {:?}", config.storage.output_root);

    let settings = &config.pipeline;
    let source = FsRecordSource::open(
        &config.storage,
        &settings.song_data_dir,
        &settings.log_data_dir,
        settings.record_policy,
    )
    .context("Failed to open input")?;
    let store = ParquetWarehouseStore::open(&config.storage, settings.write_mode)
        .context("Failed to open output")?;
    info!("Run id: {}", store.run_id());

    let summary = match Pipeline::new(settings, &source, &store).run() {
        Ok(summary) => summary,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    info!(
        "Read {} metadata records ({} skipped), {} events ({} skipped)",
        summary.metadata_records,
        summary.metadata_skipped,
        summary.event_records,
        summary.events_skipped
    );
    info!(
        "{} plays ({} malformed skipped), {} without a matching song",
        summary.plays, summary.plays_skipped, summary.join_misses
    );
    for report in &summary.tables {
        info!(
            "  {}: {} rows, {} files",
            report.table, report.rows, report.files
        );
    }
    info!("Done.");
    Ok(())
}
