pub mod models;
mod parquet_store;
pub mod partition;
mod store;
pub mod tables;

pub use parquet_store::ParquetWarehouseStore;
pub use store::{StoreError, WarehouseStore, WriteMode, WriteReport};
pub use tables::TableLayout;
