//! Streaming tabular ETL for an AMR metagenomics study: chunked left joins
//! against an in-memory side table, cross-chunk deduplication, row filtering,
//! and organism-type / biome categorization over delimited-text tables.

pub mod categorize;
pub mod config;
pub mod error;
pub mod filter;
pub mod merge;
pub mod output;
pub mod progress;
pub mod report;
pub mod sidetable;
pub mod table;
