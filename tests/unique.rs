use std::fs;

use camino::Utf8PathBuf;

use cardmeta::merge::{MergeConfig, merge};
use cardmeta::progress::NullSink;
use cardmeta::sidetable::SideTable;

fn write_table(dir: &tempfile::TempDir, name: &str, content: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
    fs::write(path.as_std_path(), content).unwrap();
    path
}

fn unique_config(source: &Utf8PathBuf, output: &Utf8PathBuf, chunk_size: usize) -> MergeConfig {
    MergeConfig {
        source: source.clone(),
        output: output.clone(),
        key_column: "acc".to_string(),
        chunk_size,
        unique: true,
        count_rows: false,
    }
}

const REPEATED_KEYS: &str = "acc,val\nA,1\nB,2\nA,3\nC,4\nB,5\nA,6\n";
const FIRST_OCCURRENCES: &str = "acc,val\nA,1\nB,2\nC,4\n";

// Side table with only the key column: the merge adds no columns and acts as
// a pure cross-chunk deduplication pass.
fn key_only_side(dir: &tempfile::TempDir) -> SideTable {
    let path = write_table(dir, "side.csv", "acc\nA\nB\nC\n");
    SideTable::load(&path, "acc", &NullSink).unwrap()
}

#[test]
fn first_occurrence_wins_regardless_of_chunk_size() {
    for chunk_size in [1, 2, 3, 1_000_000] {
        let dir = tempfile::tempdir().unwrap();
        let source = write_table(&dir, "rows.csv", REPEATED_KEYS);
        let output = Utf8PathBuf::from_path_buf(dir.path().join("unique.csv")).unwrap();
        let side = key_only_side(&dir);

        let report = merge(&unique_config(&source, &output, chunk_size), &side, &NullSink).unwrap();

        assert_eq!(report.rows_read, 6, "chunk_size={chunk_size}");
        assert_eq!(report.rows_written, 3, "chunk_size={chunk_size}");
        let content = fs::read_to_string(output.as_std_path()).unwrap();
        assert_eq!(content, FIRST_OCCURRENCES, "chunk_size={chunk_size}");
    }
}

#[test]
fn dedup_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_table(&dir, "rows.csv", REPEATED_KEYS);
    let first_output = Utf8PathBuf::from_path_buf(dir.path().join("pass1.csv")).unwrap();
    let second_output = Utf8PathBuf::from_path_buf(dir.path().join("pass2.csv")).unwrap();
    let side = key_only_side(&dir);

    merge(&unique_config(&source, &first_output, 2), &side, &NullSink).unwrap();
    let report = merge(
        &unique_config(&first_output, &second_output, 2),
        &side,
        &NullSink,
    )
    .unwrap();

    assert_eq!(report.rows_read, report.rows_written);
    let first = fs::read_to_string(first_output.as_std_path()).unwrap();
    let second = fs::read_to_string(second_output.as_std_path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn duplicates_dropped_across_chunk_boundaries() {
    // chunk_size 2 puts the repeats of A and B in later chunks.
    let dir = tempfile::tempdir().unwrap();
    let source = write_table(&dir, "rows.csv", "acc,val\nA,1\nB,2\nB,3\nA,4\nB,5\nC,6\n");
    let output = Utf8PathBuf::from_path_buf(dir.path().join("unique.csv")).unwrap();
    let side = key_only_side(&dir);

    merge(&unique_config(&source, &output, 2), &side, &NullSink).unwrap();

    let content = fs::read_to_string(output.as_std_path()).unwrap();
    assert_eq!(content, "acc,val\nA,1\nB,2\nC,6\n");
}

#[test]
fn rows_without_key_are_dropped_in_unique_mode() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_table(&dir, "rows.csv", "acc,val\nA,1\n,2\nB,3\n");
    let output = Utf8PathBuf::from_path_buf(dir.path().join("unique.csv")).unwrap();
    let side = key_only_side(&dir);

    let report = merge(&unique_config(&source, &output, 10), &side, &NullSink).unwrap();

    assert_eq!(report.rows_written, 2);
    let content = fs::read_to_string(output.as_std_path()).unwrap();
    assert_eq!(content, "acc,val\nA,1\nB,3\n");
}
