//! Integration tests for loading rule files from disk.

use ladon::{CompileFlags, LadonError, QueryPipeline, RegexEngine, RuleMetadata, RuleTable};
use std::io::Write;
use tempfile::NamedTempFile;

fn rule_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Should create temp file");
    file.write_all(content.as_bytes())
        .expect("Should write rule file");
    file
}

#[test]
fn test_load_counts_well_formed_lines() {
    let file = rule_file(
        "# sample rules\n\
         1\tfoo\tfirst\n\
         2\tbar\tsecond\n\
         too\tfew\n\
         \n\
         3\tba[rz]\tthird\n",
    );

    let table = RuleTable::from_path(file.path(), CompileFlags::empty()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.id_count(), 3);
    assert_eq!(
        table.metadata(3),
        Some(&RuleMetadata::new("ba[rz]", "third"))
    );
}

#[test]
fn test_load_with_duplicates_counts_distinct_ids() {
    let file = rule_file("1\tfoo\ta\n2\tbar\tb\n1\tbaz\tc\n");

    let table = RuleTable::from_path(file.path(), CompileFlags::empty()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.id_count(), 2);
    assert_eq!(table.metadata(1).unwrap().payload, "c");
}

#[test]
fn test_load_without_valid_lines_fails() {
    let file = rule_file("# nothing here\n\n1\tonly-two\n");

    let result = RuleTable::from_path(file.path(), CompileFlags::empty());
    assert!(matches!(result, Err(LadonError::EmptyRuleSet)));
}

#[test]
fn test_non_numeric_id_aborts_load() {
    let file = rule_file("1\tfoo\tok\nx1\tbar\tbad id\n");

    match RuleTable::from_path(file.path(), CompileFlags::empty()) {
        Err(error @ LadonError::InvalidRuleId { .. }) => assert!(error.is_fatal()),
        other => panic!("Expected InvalidRuleId, got {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = RuleTable::from_path(dir.path().join("absent.tsv"), CompileFlags::empty());
    assert!(matches!(result, Err(LadonError::Io(_))));
}

#[test]
fn test_pipeline_from_path() {
    let file = rule_file("10\thttps?://[a-z.]+\turl\n20\tpassword\tsecret\n");
    let pipeline = QueryPipeline::from_path(
        RegexEngine::new(),
        file.path(),
        CompileFlags::parse("iu").unwrap(),
    )
    .unwrap();

    assert_eq!(pipeline.rule_count(), 2);

    let input = b"PASSWORD at http://example.com";
    let result = pipeline.execute(input);
    let found: Vec<_> = result
        .matches
        .iter()
        .map(|m| (m.rule_id, m.matched(input).unwrap().to_vec()))
        .collect();
    assert_eq!(
        found,
        vec![
            (20, b"PASSWORD".to_vec()),
            (10, b"http://example.com".to_vec()),
        ]
    );
}

#[test]
fn test_bad_pattern_aborts_startup() {
    let file = rule_file("1\tfoo\tok\n2\t[unterminated\tbroken\n");

    let result = QueryPipeline::from_path(RegexEngine::new(), file.path(), CompileFlags::empty());
    match result {
        Err(LadonError::Compile { rule_id, .. }) => assert_eq!(rule_id, 2),
        Err(other) => panic!("Expected Compile error, got {other:?}"),
        Ok(_) => panic!("Expected Compile error, got a pipeline"),
    }
}
