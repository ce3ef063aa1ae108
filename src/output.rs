use std::collections::BTreeMap;
use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::report::{CategorizeReport, FilterReport, MergeReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
pub struct MergeSummary {
    pub finished_at: String,
    pub rows_read: u64,
    pub rows_written: u64,
    pub missing_rows: u64,
    pub distinct_missing_keys: usize,
    pub overlap_columns: Vec<String>,
    pub elapsed_ms: u64,
    pub output: String,
    pub diagnostics: Option<String>,
}

impl MergeSummary {
    pub fn from_report(
        report: &MergeReport,
        output: &Utf8Path,
        diagnostics: Option<&Utf8Path>,
    ) -> Self {
        Self {
            finished_at: chrono::Utc::now().to_rfc3339(),
            rows_read: report.rows_read,
            rows_written: report.rows_written,
            missing_rows: report.missing_rows,
            distinct_missing_keys: report.distinct_missing_keys(),
            overlap_columns: report.overlap_columns.clone(),
            elapsed_ms: report.elapsed.as_millis() as u64,
            output: output.to_string(),
            diagnostics: diagnostics.map(|path| path.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FilterSummary {
    pub finished_at: String,
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_dropped: u64,
    pub elapsed_ms: u64,
    pub output: String,
}

impl FilterSummary {
    pub fn from_report(report: &FilterReport, output: &Utf8Path) -> Self {
        Self {
            finished_at: chrono::Utc::now().to_rfc3339(),
            rows_read: report.rows_read,
            rows_written: report.rows_written,
            rows_dropped: report.rows_dropped(),
            elapsed_ms: report.elapsed.as_millis() as u64,
            output: output.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategorizeSummary {
    pub finished_at: String,
    pub rows_read: u64,
    pub rows_written: u64,
    pub isolate_rows: u64,
    pub category_counts: BTreeMap<String, u64>,
    pub elapsed_ms: u64,
    pub output: String,
}

impl CategorizeSummary {
    pub fn from_report(report: &CategorizeReport, output: &Utf8Path) -> Self {
        Self {
            finished_at: chrono::Utc::now().to_rfc3339(),
            rows_read: report.rows_read,
            rows_written: report.rows_written,
            isolate_rows: report.isolate_rows,
            category_counts: report.category_counts.clone(),
            elapsed_ms: report.elapsed.as_millis() as u64,
            output: output.to_string(),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_merge(summary: &MergeSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_filter(summary: &FilterSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_categorize(summary: &CategorizeSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::progress::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::progress::ProgressEvent) {}
}
