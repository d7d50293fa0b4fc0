//! # mechdb
//!
//! Entity-graph ingest engine for game-asset descriptor trees.
//!
//! This library provides functionality to:
//! - Resolve cross-file asset references into (file, record-index) pairs
//! - Walk a descriptor export lazily, interning every referenced entity
//! - Merge templated descriptors with instance overrides, cycle-safe
//! - Drive declarative key-maps that route properties into entity tables
//! - Normalize per-level data into constants and variables
//! - Compute per-module growth, per-stat rankings, and cost totals
//! - Write deterministic, pretty-printed JSON entity tables
//!
//! ## Example
//!
//! ```no_run
//! # fn main() -> Result<(), mechdb::ParseError> {
//! let options = mechdb::Options::new("exports", "Root", "output/data");
//! mechdb::run(options)?;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod curves;
pub mod entities;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod levels;
pub mod localization;
pub mod refpath;
pub mod registry;
pub mod store;
pub mod template;
pub mod writer;

pub use error::{ParseError, Result};
pub use ingest::{Ingest, Options};

use std::fs;

/// Execute a full run: clear the output directory, ingest the tree, run
/// the analysis, and flush every table.
pub fn run(options: Options) -> Result<()> {
    let output = options.output_dir.clone();
    if output.exists() {
        fs::remove_dir_all(&output).map_err(|source| ParseError::Io {
            path: output.clone(),
            source,
        })?;
    }

    let mut ing = Ingest::new(options);
    ing.run()?;
    let analysis = analysis::run(&ing.registries);
    writer::write_all(&ing, &analysis)
}
