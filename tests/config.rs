use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use cardmeta::config::ConfigLoader;
use cardmeta::error::PipelineError;
use cardmeta::filter::filter;
use cardmeta::merge::merge;
use cardmeta::progress::NullSink;
use cardmeta::sidetable::SideTable;

#[test]
fn resolves_full_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("cardmeta.json");
    fs::write(
        &config_path,
        r#"{
            "schema_version": 1,
            "merge": {
                "source": "data/card_alignment.csv",
                "side_table": "data/SRA_metadata.csv",
                "output": "data/card_metadata.csv",
                "diagnostics": "data/missing_accessions.csv",
                "chunk_size": 250000,
                "unique": true
            },
            "filter": {
                "source": "data/card_metadata.csv",
                "output": "data/card_no_amplicon.csv",
                "column": "assay_type",
                "one_of": ["AMPLICON"],
                "invert": true
            },
            "categorize": {
                "source": "data/card_metadata.csv",
                "output": "data/card_biomes.csv",
                "minimal": true
            }
        }"#,
    )
    .unwrap();

    let config = ConfigLoader::resolve(Some(config_path.to_str().unwrap())).unwrap();
    let merge_job = config.merge.unwrap();
    assert_eq!(merge_job.chunk_size, 250_000);
    assert!(merge_job.unique);
    assert_eq!(
        merge_job.diagnostics.as_deref().map(|p| p.as_str()),
        Some("data/missing_accessions.csv")
    );

    let filter_job = config.filter.unwrap();
    assert_eq!(filter_job.column, "assay_type");
    assert!(filter_job.invert);

    let categorize_job = config.categorize.unwrap();
    assert_eq!(categorize_job.key_column, "acc");
    assert!(categorize_job.minimal);
}

#[test]
fn missing_default_config_reported() {
    let err = ConfigLoader::resolve(None).unwrap_err();
    assert_matches!(err, PipelineError::MissingConfig);
}

#[test]
fn unreadable_explicit_config_reported() {
    let err = ConfigLoader::resolve(Some("/nonexistent/cardmeta.json")).unwrap_err();
    assert_matches!(err, PipelineError::ConfigRead(_));
}

#[test]
fn malformed_config_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("cardmeta.json");
    fs::write(&config_path, "{ not json").unwrap();

    let err = ConfigLoader::resolve(Some(config_path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, PipelineError::ConfigParse(_));
}

#[test]
fn config_drives_a_merge_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    fs::write(
        root.join("alignment.csv").as_std_path(),
        "acc,gene\nSRR1,blaTEM\nSRR1,tetA\n",
    )
    .unwrap();
    fs::write(
        root.join("metadata.csv").as_std_path(),
        "acc,organism\nSRR1,human gut metagenome\n",
    )
    .unwrap();

    let config_path = root.join("cardmeta.json");
    fs::write(
        config_path.as_std_path(),
        format!(
            r#"{{
                "merge": {{
                    "source": "{root}/alignment.csv",
                    "side_table": "{root}/metadata.csv",
                    "output": "{root}/merged.csv",
                    "chunk_size": 1,
                    "unique": true
                }}
            }}"#
        ),
    )
    .unwrap();

    let config = ConfigLoader::resolve(Some(config_path.as_str())).unwrap();
    let job = config.merge.unwrap();
    let side = SideTable::load(&job.side_table, &job.key_column, &NullSink).unwrap();
    let report = merge(&job.to_merge_config(), &side, &NullSink).unwrap();

    assert_eq!(report.rows_written, 1);
    let content = fs::read_to_string(root.join("merged.csv").as_std_path()).unwrap();
    assert_eq!(
        content,
        "acc,gene,organism\nSRR1,blaTEM,human gut metagenome\n"
    );
}

#[test]
fn config_drives_a_filter_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    fs::write(
        root.join("metadata.csv").as_std_path(),
        "acc,organism\nSRR1,human gut metagenome\nSRR2,Escherichia coli\n",
    )
    .unwrap();

    let config_path = root.join("cardmeta.json");
    fs::write(
        config_path.as_std_path(),
        format!(
            r#"{{
                "filter": {{
                    "source": "{root}/metadata.csv",
                    "output": "{root}/metagenomes.csv",
                    "column": "organism",
                    "contains": "metagenome",
                    "chunk_size": 1
                }}
            }}"#
        ),
    )
    .unwrap();

    let config = ConfigLoader::resolve(Some(config_path.as_str())).unwrap();
    let job = config.filter.unwrap();
    let report = filter(&job.to_filter_config().unwrap(), &NullSink).unwrap();

    assert_eq!(report.rows_read, 2);
    assert_eq!(report.rows_written, 1);
    let content = fs::read_to_string(root.join("metagenomes.csv").as_std_path()).unwrap();
    assert_eq!(content, "acc,organism\nSRR1,human gut metagenome\n");
}
