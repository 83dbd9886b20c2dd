//! Genepop Index: random-access indexing and subsampling of Genepop files
//!
//! This library indexes the byte offset of every line of a Genepop
//! population-genetics file in one pass, then writes subsamples of it by
//! re-reading only the selected lines.
//!
//! # Features
//!
//! - **Byte-offset index**: header, populations and multi-line individuals
//! - **Tagged subsamples**: population, individual and loci selections kept side by side
//! - **Reproducible sampling**: seeded RNG for proportional, fixed-size and removal draws
//! - **Batch sessions**: one population list sampled over many values and replicates
//! - **Range strings**: `"1-3,10~21,100,3~11:2"` parsed into merged interval collections
//!
//! # Example
//!
//! ```rust,no_run
//! use genepop_index::manager::{GenepopFileManager, WriteOptions};
//!
//! let mut manager = GenepopFileManager::with_seed("input.gen", 42).unwrap();
//! manager.subsample_individuals_by_proportion(0.5, "p_0.5_r_0").unwrap();
//!
//! let options = WriteOptions::new().with_individuals("p_0.5_r_0");
//! manager.write("half.gen", &options).unwrap();
//! ```

pub mod config;
pub mod genepop;
pub mod index;
pub mod interval;
pub mod manager;
pub mod ranges;
pub mod registry;
pub mod sampler;
pub mod sampling;

// Re-export commonly used types
pub use genepop::{GenepopError, Result};
pub use index::FileIndex;
pub use interval::Interval;
pub use manager::{GenepopFileManager, WriteOptions, WriteStats};
pub use ranges::{MinMaxDelimiter, RangeCollection, RangeStringParser};
pub use sampler::{CountParams, ProportionParams, RemovalParams, SampleTag};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::genepop::{GenepopError, Result};
    pub use crate::index::FileIndex;
    pub use crate::interval::Interval;
    pub use crate::manager::{GenepopFileManager, WriteOptions, WriteStats};
    pub use crate::ranges::{MinMaxDelimiter, RangeCollection, RangeStringParser};
    pub use crate::registry::SubsampleKind;
    pub use crate::sampler::{CountParams, ProportionParams, RemovalParams, SampleTag};
    pub use crate::sampling::SampleScheme;
}
