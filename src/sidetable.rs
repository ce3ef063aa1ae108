use std::collections::HashMap;
use std::time::Instant;

use camino::Utf8Path;

use crate::error::PipelineError;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::table::ChunkReader;

const LOAD_CHUNK_SIZE: usize = 500_000;

/// In-memory lookup table for the smaller side of a join: key value to the
/// side columns of the last row carrying that key. Built once per run, then
/// read-only during the streaming pass.
///
/// Duplicate keys in the source follow a last-seen-wins policy: a later row
/// with the same key replaces the earlier one.
#[derive(Debug)]
pub struct SideTable {
    columns: Vec<String>,
    rows: HashMap<String, Vec<String>>,
}

impl SideTable {
    /// Loads every column except the key column.
    pub fn load(
        path: &Utf8Path,
        key_column: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Self, PipelineError> {
        Self::load_selected(path, key_column, None, sink)
    }

    /// Loads only the named columns. Fails with `MissingColumn` if any of
    /// them is absent from the header.
    pub fn load_columns(
        path: &Utf8Path,
        key_column: &str,
        keep: &[&str],
        sink: &dyn ProgressSink,
    ) -> Result<Self, PipelineError> {
        Self::load_selected(path, key_column, Some(keep), sink)
    }

    fn load_selected(
        path: &Utf8Path,
        key_column: &str,
        keep: Option<&[&str]>,
        sink: &dyn ProgressSink,
    ) -> Result<Self, PipelineError> {
        let start = Instant::now();
        let mut reader = ChunkReader::open(path, LOAD_CHUNK_SIZE)?;
        let key_index = reader.header().require(key_column, path)?;

        let mut indices = Vec::new();
        let mut columns = Vec::new();
        match keep {
            Some(keep) => {
                for name in keep {
                    let index = reader.header().require(name, path)?;
                    if index != key_index {
                        indices.push(index);
                        columns.push(name.to_string());
                    }
                }
            }
            None => {
                for (index, name) in reader.header().columns().iter().enumerate() {
                    if index != key_index {
                        indices.push(index);
                        columns.push(name.clone());
                    }
                }
            }
        }

        let mut rows = HashMap::new();
        let mut total = 0u64;
        let mut chunk_number = 0u64;
        while let Some(chunk) = reader.next_chunk()? {
            chunk_number += 1;
            total += chunk.len() as u64;
            for record in &chunk {
                let key = record.get(key_index).unwrap_or("").trim();
                if key.is_empty() {
                    continue;
                }
                let values = indices
                    .iter()
                    .map(|&index| record.get(index).unwrap_or("").to_string())
                    .collect();
                rows.insert(key.to_string(), values);
            }
            sink.event(ProgressEvent::message(format!(
                "phase=Load; side table chunk {chunk_number} with {} rows, {total} total",
                chunk.len()
            )));
        }
        sink.event(ProgressEvent::timed(
            format!(
                "phase=Load; side table complete, {} unique keys from {total} rows",
                rows.len()
            ),
            start.elapsed(),
        ));

        Ok(Self { columns, rows })
    }

    /// Side columns carried into the merge, key column excluded, in source
    /// header order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
