use std::time::Instant;

use camino::Utf8PathBuf;

use crate::error::PipelineError;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::report::FilterReport;
use crate::table::{ChunkReader, ChunkWriter};

/// Row predicate evaluated against a single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPredicate {
    /// Value contains the substring (case-sensitive).
    Contains(String),
    /// Value equals one of the listed strings.
    OneOf(Vec<String>),
    /// Value is non-empty after trimming.
    NonEmpty,
}

impl FilterPredicate {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            FilterPredicate::Contains(needle) => value.contains(needle.as_str()),
            FilterPredicate::OneOf(values) => values.iter().any(|candidate| candidate == value),
            FilterPredicate::NonEmpty => !value.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub source: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub column: String,
    pub predicate: FilterPredicate,
    /// Drop matching rows instead of keeping them.
    pub invert: bool,
    pub chunk_size: usize,
}

/// Chunked keep/drop pass over a table. Rows whose column value satisfies
/// the predicate are kept; with `invert` they are dropped instead. Column
/// order and row order are preserved, header written once.
pub fn filter(
    config: &FilterConfig,
    sink: &dyn ProgressSink,
) -> Result<FilterReport, PipelineError> {
    let start = Instant::now();
    let mut reader = ChunkReader::open(&config.source, config.chunk_size)?;
    let column_index = reader.header().require(&config.column, &config.source)?;

    let mut writer = ChunkWriter::create(&config.output)?;
    writer.write_header(reader.header())?;

    let mut report = FilterReport::default();
    let mut chunk_number = 0u64;

    while let Some(chunk) = reader.next_chunk()? {
        let chunk_start = Instant::now();
        chunk_number += 1;
        report.rows_read += chunk.len() as u64;

        let mut written_in_chunk = 0u64;
        for record in &chunk {
            let value = record.get(column_index).unwrap_or("");
            if config.predicate.matches(value) != config.invert {
                writer.write_row(record)?;
                written_in_chunk += 1;
            }
        }
        report.rows_written += written_in_chunk;

        sink.event(ProgressEvent::timed(
            format!(
                "phase=Filter; chunk {chunk_number} kept {written_in_chunk} of {} rows",
                chunk.len()
            ),
            chunk_start.elapsed(),
        ));
    }

    writer.finish()?;
    report.elapsed = start.elapsed();
    sink.event(ProgressEvent::timed(
        format!(
            "phase=Filter; complete, {} rows read, {} kept",
            report.rows_read, report.rows_written
        ),
        report.elapsed,
    ));
    Ok(report)
}
