use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("missing required column '{column}' in {path}")]
    MissingColumn { column: String, path: Utf8PathBuf },

    #[error("failed to open {path}: {message}")]
    OpenInput { path: Utf8PathBuf, message: String },

    #[error("failed to read {path}: {message}")]
    ReadInput { path: Utf8PathBuf, message: String },

    #[error("failed to write {path}: {message}")]
    WriteOutput { path: Utf8PathBuf, message: String },

    #[error("missing config file cardmeta.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("invalid filter predicate: {0}")]
    InvalidPredicate(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
