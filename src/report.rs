use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use camino::Utf8Path;

use crate::error::PipelineError;
use crate::sidetable::SideTable;
use crate::table::{ChunkWriter, Header};

/// Per-run accounting for a merge pass. Join misses are data outcomes, not
/// errors: they are tallied here and optionally persisted as a diagnostic
/// table at the end of the run.
#[derive(Debug, Default)]
pub struct MergeReport {
    pub rows_read: u64,
    pub rows_written: u64,
    pub missing_rows: u64,
    pub missing_keys: HashMap<String, u64>,
    pub overlap_columns: Vec<String>,
    pub elapsed: Duration,
}

impl MergeReport {
    pub fn record_miss(&mut self, key: &str) {
        self.missing_rows += 1;
        *self.missing_keys.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn distinct_missing_keys(&self) -> usize {
        self.missing_keys.len()
    }
}

#[derive(Debug, Default)]
pub struct FilterReport {
    pub rows_read: u64,
    pub rows_written: u64,
    pub elapsed: Duration,
}

impl FilterReport {
    pub fn rows_dropped(&self) -> u64 {
        self.rows_read - self.rows_written
    }
}

#[derive(Debug, Default)]
pub struct CategorizeReport {
    pub rows_read: u64,
    pub rows_written: u64,
    pub isolate_rows: u64,
    pub category_counts: BTreeMap<String, u64>,
    pub elapsed: Duration,
}

/// Persists the missing-key frequency table, sorted by descending count with
/// ties broken by key for a stable file.
pub fn write_missing_keys(
    path: &Utf8Path,
    report: &MergeReport,
    side: &SideTable,
) -> Result<(), PipelineError> {
    let mut entries: Vec<(&String, &u64)> = report.missing_keys.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let header = Header::new(vec![
        "key".to_string(),
        "count".to_string(),
        "in_source".to_string(),
        "in_side_table".to_string(),
    ]);
    let mut writer = ChunkWriter::create(path)?;
    writer.write_header(&header)?;
    for (key, count) in entries {
        let count = count.to_string();
        let in_side = side.contains(key).to_string();
        writer.write_row([key.as_str(), count.as_str(), "true", in_side.as_str()])?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;

    use crate::progress::NullSink;

    use super::*;

    #[test]
    fn missing_keys_sorted_by_descending_count() {
        let dir = tempfile::tempdir().unwrap();
        let side_path = Utf8PathBuf::from_path_buf(dir.path().join("side.csv")).unwrap();
        fs::write(side_path.as_std_path(), "acc,val\nSRR9,x\n").unwrap();
        let side = SideTable::load(&side_path, "acc", &NullSink).unwrap();

        let mut report = MergeReport::default();
        report.record_miss("B");
        report.record_miss("A");
        report.record_miss("B");
        report.record_miss("C");
        report.record_miss("A");
        report.record_miss("B");
        assert_eq!(report.missing_rows, 6);
        assert_eq!(report.distinct_missing_keys(), 3);

        let diag = Utf8PathBuf::from_path_buf(dir.path().join("missing.csv")).unwrap();
        write_missing_keys(&diag, &report, &side).unwrap();

        let content = fs::read_to_string(diag.as_std_path()).unwrap();
        assert_eq!(
            content,
            "key,count,in_source,in_side_table\n\
             B,3,true,false\n\
             A,2,true,false\n\
             C,1,true,false\n"
        );
    }
}
