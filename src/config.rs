use std::fs;

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::categorize::CategorizeConfig;
use crate::error::PipelineError;
use crate::filter::{FilterConfig, FilterPredicate};
use crate::merge::MergeConfig;

pub const DEFAULT_CHUNK_SIZE: usize = 500_000;
pub const DEFAULT_KEY_COLUMN: &str = "acc";
pub const DEFAULT_ORGANISM_COLUMN: &str = "organism";
pub const DEFAULT_LIBRARY_SOURCE_COLUMN: &str = "librarysource";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub merge: Option<MergeJob>,
    #[serde(default)]
    pub filter: Option<FilterJob>,
    #[serde(default)]
    pub categorize: Option<CategorizeJob>,
}

#[derive(Debug, Deserialize)]
pub struct MergeJob {
    pub source: Utf8PathBuf,
    pub side_table: Utf8PathBuf,
    pub output: Utf8PathBuf,
    #[serde(default = "default_key_column")]
    pub key_column: String,
    #[serde(default)]
    pub diagnostics: Option<Utf8PathBuf>,
    #[serde(default)]
    pub side_columns: Option<Vec<String>>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "default_true")]
    pub count_rows: bool,
}

#[derive(Debug, Deserialize)]
pub struct FilterJob {
    pub source: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub column: String,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub one_of: Option<Vec<String>>,
    #[serde(default)]
    pub non_empty: bool,
    #[serde(default)]
    pub invert: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct CategorizeJob {
    pub source: Utf8PathBuf,
    pub output: Utf8PathBuf,
    #[serde(default = "default_key_column")]
    pub key_column: String,
    #[serde(default = "default_organism_column")]
    pub organism_column: String,
    #[serde(default = "default_library_source_column")]
    pub library_source_column: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub minimal: bool,
}

impl MergeJob {
    pub fn to_merge_config(&self) -> MergeConfig {
        MergeConfig {
            source: self.source.clone(),
            output: self.output.clone(),
            key_column: self.key_column.clone(),
            chunk_size: self.chunk_size,
            unique: self.unique,
            count_rows: self.count_rows,
        }
    }
}

impl FilterJob {
    pub fn to_filter_config(&self) -> Result<FilterConfig, PipelineError> {
        Ok(FilterConfig {
            source: self.source.clone(),
            output: self.output.clone(),
            column: self.column.clone(),
            predicate: self.predicate()?,
            invert: self.invert,
            chunk_size: self.chunk_size,
        })
    }

    fn predicate(&self) -> Result<FilterPredicate, PipelineError> {
        match (&self.contains, &self.one_of, self.non_empty) {
            (Some(needle), None, false) => Ok(FilterPredicate::Contains(needle.clone())),
            (None, Some(values), false) => Ok(FilterPredicate::OneOf(values.clone())),
            (None, None, true) => Ok(FilterPredicate::NonEmpty),
            _ => Err(PipelineError::InvalidPredicate(
                "exactly one of contains, one_of or non_empty is required".to_string(),
            )),
        }
    }
}

impl CategorizeJob {
    pub fn to_categorize_config(&self) -> CategorizeConfig {
        CategorizeConfig {
            source: self.source.clone(),
            output: self.output.clone(),
            key_column: self.key_column.clone(),
            organism_column: self.organism_column.clone(),
            library_source_column: self.library_source_column.clone(),
            chunk_size: self.chunk_size,
            unique: self.unique,
            minimal: self.minimal,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<Config, PipelineError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from("cardmeta.json"),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Err(PipelineError::MissingConfig);
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| PipelineError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| PipelineError::ConfigParse(err.to_string()))
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_key_column() -> String {
    DEFAULT_KEY_COLUMN.to_string()
}

fn default_organism_column() -> String {
    DEFAULT_ORGANISM_COLUMN.to_string()
}

fn default_library_source_column() -> String {
    DEFAULT_LIBRARY_SOURCE_COLUMN.to_string()
}

fn default_true() -> bool {
    true
}
