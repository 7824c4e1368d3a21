//! Counts person-name mentions in long documents.
//!
//! Lines are merged into text units ([`batcher`]), a pluggable tagger picks
//! the names out of each unit ([`extractor`], [`oracles`]) and the names are
//! counted and ranked ([`frequency`]). Two drivers run that pipeline: one
//! unit at a time ([`map_reduce_seq`]) or as map, shuffle and reduce stages
//! over a worker pool ([`mr_parallel`]). [`pipeline::run`] ties either of
//! them to the input and output files.

pub mod batcher;
pub mod common;
pub mod config;
pub mod error;
pub mod extractor;
pub mod frequency;
pub mod map_reduce_seq;
pub mod mr_parallel;
pub mod oracles;
pub mod pipeline;

pub use common::{MapReduce, TextUnit};
pub use config::{FailurePolicy, Mode, PipelineConfig};
pub use error::{Error, OracleError};
pub use frequency::{FrequencyTable, RankedResult};
pub use oracles::{JiebaOracle, LexiconOracle, NameOracle, PatternOracle, Tagged};
pub use pipeline::{Report, Source};
