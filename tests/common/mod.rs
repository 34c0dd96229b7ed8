//! Common test infrastructure
//!
//! Builds an input corpus in a temporary directory and runs the pipeline
//! against it. Tests should only import from this module, not from
//! internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestWarehouse, song_json, play_json, SONG_1_ID};
//!
//! #[test]
//! fn test_single_play() {
//!     let warehouse = TestWarehouse::with_input(&[song_json(SONG_1_ID)], &[play_json()]);
//!     let summary = warehouse.run_default().unwrap();
//!     assert_eq!(summary.plays, 1);
//! }
//! ```

#![allow(dead_code)]

mod constants;
mod fixtures;
mod warehouse;

// Public API - this is what tests import
pub use constants::*;
pub use fixtures::*;
pub use warehouse::TestWarehouse;
