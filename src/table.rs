use std::fs::{self, File};

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ByteRecord, ReaderBuilder, StringRecord, StringRecordsIntoIter, WriterBuilder};
use tempfile::TempPath;

use crate::error::PipelineError;

pub fn delimiter_for(path: &Utf8Path) -> u8 {
    match path.extension() {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

#[derive(Debug, Clone)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn from_record(record: &StringRecord) -> Self {
        Self {
            columns: record.iter().map(|field| field.to_string()).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn require(&self, name: &str, path: &Utf8Path) -> Result<usize, PipelineError> {
        self.index_of(name)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
                path: path.to_owned(),
            })
    }
}

/// Forward-only reader over a delimited table, yielding bounded row batches.
/// The header line is consumed on open and not part of any chunk.
pub struct ChunkReader {
    path: Utf8PathBuf,
    header: Header,
    records: StringRecordsIntoIter<File>,
    chunk_size: usize,
}

impl std::fmt::Debug for ChunkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReader")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl ChunkReader {
    pub fn open(path: &Utf8Path, chunk_size: usize) -> Result<Self, PipelineError> {
        if chunk_size == 0 {
            return Err(PipelineError::InvalidChunkSize);
        }
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter_for(path))
            .from_path(path.as_std_path())
            .map_err(|err| PipelineError::OpenInput {
                path: path.to_owned(),
                message: err.to_string(),
            })?;
        let header = Header::from_record(reader.headers().map_err(|err| {
            PipelineError::ReadInput {
                path: path.to_owned(),
                message: err.to_string(),
            }
        })?);
        Ok(Self {
            path: path.to_owned(),
            header,
            records: reader.into_records(),
            chunk_size,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn next_chunk(&mut self) -> Result<Option<Vec<StringRecord>>, PipelineError> {
        let mut rows = Vec::new();
        while rows.len() < self.chunk_size {
            match self.records.next() {
                Some(Ok(record)) => rows.push(record),
                Some(Err(err)) => {
                    return Err(PipelineError::ReadInput {
                        path: self.path.clone(),
                        message: err.to_string(),
                    });
                }
                None => break,
            }
        }
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows))
        }
    }
}

/// Counts data rows (header excluded) in a full pass over the table.
pub fn count_rows(path: &Utf8Path) -> Result<u64, PipelineError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .from_path(path.as_std_path())
        .map_err(|err| PipelineError::OpenInput {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
    let mut record = ByteRecord::new();
    let mut total = 0u64;
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => total += 1,
            Ok(false) => break,
            Err(err) => {
                return Err(PipelineError::ReadInput {
                    path: path.to_owned(),
                    message: err.to_string(),
                });
            }
        }
    }
    Ok(total)
}

/// Incremental writer for chunked output. Rows land in a temp file next to
/// the destination; `finish` renames it over the final path, so a failed run
/// never leaves a half-written output under the destination name.
pub struct ChunkWriter {
    writer: csv::Writer<File>,
    temp: TempPath,
    dest: Utf8PathBuf,
    wrote_header: bool,
}

impl ChunkWriter {
    pub fn create(dest: &Utf8Path) -> Result<Self, PipelineError> {
        let parent = match dest.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| PipelineError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix(".cardmeta")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| PipelineError::Filesystem(err.to_string()))?;
        let (file, temp_path) = temp.into_parts();
        let writer = WriterBuilder::new()
            .delimiter(delimiter_for(dest))
            .from_writer(file);
        Ok(Self {
            writer,
            temp: temp_path,
            dest: dest.to_owned(),
            wrote_header: false,
        })
    }

    /// Writes the header line once; later calls are no-ops.
    pub fn write_header(&mut self, header: &Header) -> Result<(), PipelineError> {
        if self.wrote_header {
            return Ok(());
        }
        self.writer
            .write_record(header.columns())
            .map_err(|err| self.write_error(err))?;
        self.wrote_header = true;
        Ok(())
    }

    pub fn write_row<I, F>(&mut self, row: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        self.writer
            .write_record(row)
            .map_err(|err| self.write_error(err))
    }

    pub fn finish(self) -> Result<(), PipelineError> {
        let Self {
            writer, temp, dest, ..
        } = self;
        let file = writer
            .into_inner()
            .map_err(|err| PipelineError::WriteOutput {
                path: dest.clone(),
                message: err.to_string(),
            })?;
        drop(file);
        temp.persist(dest.as_std_path())
            .map_err(|err| PipelineError::WriteOutput {
                path: dest,
                message: err.to_string(),
            })?;
        Ok(())
    }

    fn write_error(&self, err: csv::Error) -> PipelineError {
        PipelineError::WriteOutput {
            path: self.dest.clone(),
            message: err.to_string(),
        }
    }
}
