use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use camino::Utf8PathBuf;
use regex::Regex;

use crate::error::PipelineError;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::report::CategorizeReport;
use crate::table::{ChunkReader, ChunkWriter, Header};

pub const OTHER_CATEGORY: &str = "other";

pub const ORGANISM_TYPE_COLUMN: &str = "organism_type";
pub const CATEGORY_COLUMN: &str = "metagenome_category";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganismType {
    Metagenome,
    Isolate,
}

impl OrganismType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganismType::Metagenome => "Metagenome",
            OrganismType::Isolate => "Isolate",
        }
    }
}

impl fmt::Display for OrganismType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification<'a> {
    pub organism_type: OrganismType,
    /// Biome label for metagenome records; isolates never get one.
    pub category: Option<&'a str>,
}

// Exact organism strings per biome, as curated for the study.
const HUMAN_ORGANISMS: &[&str] = &[
    "human gut metagenome",
    "human metagenome",
    "human oral metagenome",
    "human skin metagenome",
    "human feces metagenome",
    "human vaginal metagenome",
    "human nasopharyngeal metagenome",
    "human lung metagenome",
    "human saliva metagenome",
    "human reproductive system metagenome",
    "human urinary tract metagenome",
    "human eye metagenome",
    "human blood metagenome",
    "human bile metagenome",
    "human tracheal metagenome",
    "human brain metagenome",
    "human milk metagenome",
    "human semen metagenome",
    "human skeleton metagenome",
];

const LIVESTOCK_ORGANISMS: &[&str] = &[
    "bovine gut metagenome",
    "bovine metagenome",
    "pig gut metagenome",
    "pig metagenome",
    "chicken gut metagenome",
    "chicken metagenome",
    "sheep gut metagenome",
    "sheep metagenome",
];

const MARINE_ORGANISMS: &[&str] = &["marine metagenome", "seawater metagenome"];

const FRESHWATER_ORGANISMS: &[&str] = &[
    "freshwater metagenome",
    "lake water metagenome",
    "groundwater metagenome",
];

const SOIL_ORGANISMS: &[&str] = &["soil metagenome"];

const WASTEWATER_ORGANISMS: &[&str] = &["wastewater metagenome"];

// Species names used as a fallback when the library source is metagenomic but
// the organism field carries a host species instead of a biome string.
const LIVESTOCK_SPECIES: &[&str] = &[
    "Sus scrofa",
    "Sus scrofa domesticus",
    "Sus scrofa affinis",
    "Bos taurus",
    "Gallus gallus",
    "Equus caballus",
    "Equs caballus",
    "Ovis aries",
    "Ovis",
    "Bos indicus",
    "Bos mutus",
    "Bos primigenius",
    "Bos frontalis",
    "Bos gaurus",
    "Gallus",
    "Capra hircus",
    "Capra aegagrus",
    "Capra ibex",
];

const HUMAN_SPECIES: &[&str] = &["Homo sapiens"];

/// Immutable organism-to-biome lookup data. Passed explicitly into the
/// classifier so tests can substitute alternate tables.
#[derive(Debug, Clone)]
pub struct BiomeTables {
    by_organism: HashMap<String, String>,
    by_species: HashMap<String, String>,
}

impl BiomeTables {
    pub fn new(
        by_organism: HashMap<String, String>,
        by_species: HashMap<String, String>,
    ) -> Self {
        Self {
            by_organism,
            by_species,
        }
    }

    pub fn builtin() -> Self {
        let mut by_organism = HashMap::new();
        for (category, organisms) in [
            ("human", HUMAN_ORGANISMS),
            ("livestock", LIVESTOCK_ORGANISMS),
            ("marine", MARINE_ORGANISMS),
            ("freshwater", FRESHWATER_ORGANISMS),
            ("soil", SOIL_ORGANISMS),
            ("wastewater", WASTEWATER_ORGANISMS),
        ] {
            for organism in organisms {
                by_organism.insert(organism.to_string(), category.to_string());
            }
        }

        let mut by_species = HashMap::new();
        for (category, species) in [("livestock", LIVESTOCK_SPECIES), ("human", HUMAN_SPECIES)] {
            for name in species {
                by_species.insert(name.to_string(), category.to_string());
            }
        }

        Self {
            by_organism,
            by_species,
        }
    }

    pub fn organism_category(&self, organism: &str) -> Option<&str> {
        self.by_organism.get(organism).map(String::as_str)
    }

    pub fn species_category(&self, organism: &str) -> Option<&str> {
        self.by_species.get(organism).map(String::as_str)
    }
}

impl Default for BiomeTables {
    fn default() -> Self {
        Self::builtin()
    }
}

pub struct Classifier {
    tables: BiomeTables,
    metagenomic_source: Regex,
}

impl Classifier {
    pub fn new(tables: BiomeTables) -> Self {
        Self {
            tables,
            metagenomic_source: Regex::new(r"(?i)METAGENOMIC|METATRANSCRIPTOMIC").unwrap(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(BiomeTables::builtin())
    }

    /// Hierarchical categorization of a single record. Pure; never fails.
    ///
    /// A record is a metagenome when the organism text contains "metagenome"
    /// (case-insensitive) or the library source is metagenomic. Metagenomes
    /// resolve through the organism table, then the species table (library
    /// source permitting), then the default bucket. Isolates get no category.
    pub fn classify(&self, organism: &str, library_source: &str) -> Classification<'_> {
        let source_is_metagenomic = self.metagenomic_source.is_match(library_source);
        let organism_is_metagenome = organism.to_ascii_lowercase().contains("metagenome");
        if !organism_is_metagenome && !source_is_metagenomic {
            return Classification {
                organism_type: OrganismType::Isolate,
                category: None,
            };
        }

        let category = self
            .tables
            .organism_category(organism)
            .or_else(|| {
                if source_is_metagenomic {
                    self.tables.species_category(organism)
                } else {
                    None
                }
            })
            .unwrap_or(OTHER_CATEGORY);
        Classification {
            organism_type: OrganismType::Metagenome,
            category: Some(category),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategorizeConfig {
    pub source: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub key_column: String,
    pub organism_column: String,
    pub library_source_column: String,
    pub chunk_size: usize,
    pub unique: bool,
    /// Write only key, organism type and category instead of the full row.
    pub minimal: bool,
}

/// Chunked pass that appends `organism_type` and `metagenome_category`
/// columns to a merged table, optionally deduplicating by key.
pub fn categorize(
    config: &CategorizeConfig,
    classifier: &Classifier,
    sink: &dyn ProgressSink,
) -> Result<CategorizeReport, PipelineError> {
    let start = Instant::now();
    let mut reader = ChunkReader::open(&config.source, config.chunk_size)?;
    let key_index = reader.header().require(&config.key_column, &config.source)?;
    let organism_index = reader
        .header()
        .require(&config.organism_column, &config.source)?;
    let library_source_index = reader
        .header()
        .require(&config.library_source_column, &config.source)?;
    let source_width = reader.header().len();

    let output_header = if config.minimal {
        Header::new(vec![
            config.key_column.clone(),
            ORGANISM_TYPE_COLUMN.to_string(),
            CATEGORY_COLUMN.to_string(),
        ])
    } else {
        let mut columns = reader.header().columns().to_vec();
        columns.push(ORGANISM_TYPE_COLUMN.to_string());
        columns.push(CATEGORY_COLUMN.to_string());
        Header::new(columns)
    };

    let mut writer = ChunkWriter::create(&config.output)?;
    writer.write_header(&output_header)?;

    let mut report = CategorizeReport::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut chunk_number = 0u64;

    while let Some(chunk) = reader.next_chunk()? {
        let chunk_start = Instant::now();
        chunk_number += 1;
        report.rows_read += chunk.len() as u64;

        for record in &chunk {
            let key = record.get(key_index).unwrap_or("").trim();
            if config.unique && (key.is_empty() || !seen.insert(key.to_string())) {
                continue;
            }
            let organism = record.get(organism_index).unwrap_or("");
            let library_source = record.get(library_source_index).unwrap_or("");
            let classification = classifier.classify(organism, library_source);
            match classification.category {
                Some(category) => {
                    *report
                        .category_counts
                        .entry(category.to_string())
                        .or_insert(0) += 1;
                }
                None => report.isolate_rows += 1,
            }

            let category_label = classification.category.unwrap_or("");
            if config.minimal {
                writer.write_row([key, classification.organism_type.as_str(), category_label])?;
            } else {
                let mut row: Vec<&str> = (0..source_width)
                    .map(|index| record.get(index).unwrap_or(""))
                    .collect();
                row.push(classification.organism_type.as_str());
                row.push(category_label);
                writer.write_row(row)?;
            }
            report.rows_written += 1;
        }

        sink.event(ProgressEvent::timed(
            format!(
                "phase=Categorize; chunk {chunk_number} with {} rows, {} written so far",
                chunk.len(),
                report.rows_written
            ),
            chunk_start.elapsed(),
        ));
    }

    writer.finish()?;
    report.elapsed = start.elapsed();
    sink.event(ProgressEvent::timed(
        format!(
            "phase=Categorize; complete, {} rows read, {} written, {} isolates",
            report.rows_read, report.rows_written, report.isolate_rows
        ),
        report.elapsed,
    ));
    Ok(report)
}
