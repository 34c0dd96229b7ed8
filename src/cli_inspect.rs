//! Warehouse Inspect Tool
//!
//! Lists the tables of a warehouse output directory with their row and
//! partition counts.

use anyhow::{bail, Context, Result};
use clap::Parser;
use pezzottify_warehouse::warehouse::tables::{
    artists_layout, songplays_layout, songs_layout, time_layout, users_layout, SONGPLAYS_TABLE,
};
use pezzottify_warehouse::warehouse::TableLayout;
use pezzottify_warehouse::{ParquetWarehouseStore, WarehouseStore, WriteMode};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "warehouse-inspect")]
#[command(about = "Show the tables of a warehouse output directory")]
struct Args {
    /// Warehouse output directory
    #[arg(value_name = "OUTPUT_ROOT")]
    output_root: PathBuf,

    /// Also print every partition directory
    #[arg(long, default_value_t = false)]
    partitions: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if !args.output_root.is_dir() {
        bail!("Not a directory: {}", args.output_root.display());
    }
    info!("Inspecting {}", args.output_root.display());

    // Only reads, the write mode is irrelevant
    let store = ParquetWarehouseStore::at_root(&args.output_root, WriteMode::Append);
    let tables = store
        .list_tables()
        .context("Failed to list warehouse tables")?;
    if tables.is_empty() {
        warn!("No completed tables found");
        return Ok(());
    }

    for table in &tables {
        let Some(layout) = layout_for(&store, table)? else {
            println!("{:<10} (unknown table)", table);
            continue;
        };
        let partitions = store.list_partitions(table)?;
        let rows: usize = store
            .read_table(&layout)
            .with_context(|| format!("Failed to read table {}", table))?
            .iter()
            .map(|b| b.num_rows())
            .sum();

        if layout.is_partitioned() {
            println!(
                "{:<10} {:>8} rows  {:>5} partitions by ({})",
                table,
                rows,
                partitions.len(),
                layout.partition_by.join(", ")
            );
        } else {
            println!("{:<10} {:>8} rows", table, rows);
        }
        if args.partitions {
            for partition in &partitions {
                println!("    {}", partition.display());
            }
        }
    }
    Ok(())
}

fn layout_for(store: &ParquetWarehouseStore, table: &str) -> Result<Option<TableLayout>> {
    if table == SONGPLAYS_TABLE {
        let partitioned = !store.list_partitions(table)?.is_empty();
        return Ok(Some(songplays_layout(partitioned)));
    }
    Ok([songs_layout(), artists_layout(), users_layout(), time_layout()]
        .into_iter()
        .find(|l| l.name == table))
}
