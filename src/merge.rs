use std::collections::HashSet;
use std::time::Instant;

use camino::Utf8PathBuf;
use csv::StringRecord;

use crate::error::PipelineError;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::report::MergeReport;
use crate::sidetable::SideTable;
use crate::table::{self, ChunkReader, ChunkWriter, Header};

#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub source: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub key_column: String,
    pub chunk_size: usize,
    /// Keep only the first occurrence of each key, across chunk boundaries.
    pub unique: bool,
    /// Pre-pass full row count so chunk progress can report a percentage.
    pub count_rows: bool,
}

/// Streams the source table in bounded chunks and left-joins each row against
/// the side table. Every source row is retained; side columns are empty when
/// the key has no match. With `unique` set, only the first occurrence of each
/// key in overall source order survives, for any chunk size.
pub fn merge(
    config: &MergeConfig,
    side: &SideTable,
    sink: &dyn ProgressSink,
) -> Result<MergeReport, PipelineError> {
    let start = Instant::now();
    let mut reader = ChunkReader::open(&config.source, config.chunk_size)?;
    let key_index = reader.header().require(&config.key_column, &config.source)?;
    let source_width = reader.header().len();

    // Output layout: source columns stay in place, side-only columns are
    // appended. A side column sharing a name with a source column overwrites
    // the source value for matched rows.
    let mut overlap = Vec::new();
    let mut appended = Vec::new();
    let mut output_columns = reader.header().columns().to_vec();
    for (side_index, name) in side.columns().iter().enumerate() {
        match reader.header().index_of(name) {
            Some(source_index) => overlap.push((source_index, side_index)),
            None => {
                appended.push(side_index);
                output_columns.push(name.clone());
            }
        }
    }
    let overlap_columns: Vec<String> = overlap
        .iter()
        .map(|&(source_index, _)| reader.header().columns()[source_index].clone())
        .collect();
    if !overlap_columns.is_empty() {
        tracing::warn!(
            columns = ?overlap_columns,
            "column overlap: side table values overwrite source columns of the same name"
        );
        sink.event(ProgressEvent::message(format!(
            "phase=Merge; column overlap detected: {}",
            overlap_columns.join(", ")
        )));
    }
    let output_header = Header::new(output_columns);

    let total_rows = if config.count_rows {
        let total = table::count_rows(&config.source)?;
        sink.event(ProgressEvent::message(format!(
            "phase=Scan; {total} rows in {}",
            config.source
        )));
        Some(total)
    } else {
        None
    };

    let mut writer = ChunkWriter::create(&config.output)?;
    writer.write_header(&output_header)?;

    let mut report = MergeReport {
        overlap_columns,
        ..MergeReport::default()
    };
    let mut seen: HashSet<String> = HashSet::new();
    let mut chunk_number = 0u64;

    while let Some(chunk) = reader.next_chunk()? {
        let chunk_start = Instant::now();
        chunk_number += 1;
        report.rows_read += chunk.len() as u64;

        let mut written_in_chunk = 0u64;
        for record in &chunk {
            let key = record.get(key_index).unwrap_or("").trim().to_string();
            if config.unique && (key.is_empty() || !seen.insert(key.clone())) {
                continue;
            }
            let row = join_row(
                record,
                side,
                &key,
                source_width,
                &overlap,
                &appended,
                &mut report,
            );
            writer.write_row(&row)?;
            written_in_chunk += 1;
        }
        report.rows_written += written_in_chunk;

        let progress = match total_rows {
            Some(total) if total > 0 => format!(
                " ({:.1}% complete, {}/{total})",
                report.rows_read as f64 / total as f64 * 100.0,
                report.rows_read
            ),
            _ => String::new(),
        };
        sink.event(ProgressEvent::timed(
            format!(
                "phase=Merge; chunk {chunk_number} wrote {written_in_chunk} of {} rows{progress}",
                chunk.len()
            ),
            chunk_start.elapsed(),
        ));
    }

    writer.finish()?;
    report.elapsed = start.elapsed();
    sink.event(ProgressEvent::timed(
        format!(
            "phase=Merge; complete, {} rows read, {} written, {} rows missing a side table match",
            report.rows_read, report.rows_written, report.missing_rows
        ),
        report.elapsed,
    ));
    Ok(report)
}

fn join_row(
    record: &StringRecord,
    side: &SideTable,
    key: &str,
    source_width: usize,
    overlap: &[(usize, usize)],
    appended: &[usize],
    report: &mut MergeReport,
) -> Vec<String> {
    let mut row: Vec<String> = (0..source_width)
        .map(|index| record.get(index).unwrap_or("").to_string())
        .collect();
    match side.get(key) {
        Some(values) => {
            for &(source_index, side_index) in overlap {
                row[source_index] = values[side_index].clone();
            }
            for &side_index in appended {
                row.push(values[side_index].clone());
            }
        }
        None => {
            report.record_miss(key);
            for _ in appended {
                row.push(String::new());
            }
        }
    }
    row
}
