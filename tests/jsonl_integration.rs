//! Integration tests for JSONL storage of trial records.

use interp_bench::adapter::{Benchmark, EngineId, benchmark_for};
use interp_bench::core::{EnvironmentInfo, RunConfig, TrialRecord};
use interp_bench::fixtures::fixture_for;
use interp_bench::harness::TrialPlan;
use interp_bench::storage::JsonlWriter;

/// A record from a real one-iteration trial of `engine`.
fn make_test_record(engine: EngineId) -> TrialRecord {
    let fixture = fixture_for(engine, 6);
    let config = RunConfig { measured_iterations: 1, n: 6, ..RunConfig::default() };
    let result = benchmark_for(engine).run_trial(&fixture, &TrialPlan::from(&config));
    TrialRecord::new(&fixture.source, EnvironmentInfo::default(), config, result)
}

#[test]
fn test_write_and_read_multiple_records() {
    let dir = tempfile::tempdir().unwrap();
    let writer = JsonlWriter::new(dir.path().join("trials.jsonl"));

    let written: Vec<_> = [EngineId::Native, EngineId::Tcl, EngineId::Forth]
        .into_iter()
        .map(make_test_record)
        .collect();
    for record in &written {
        writer.append(record).expect("failed to append record");
    }

    let records = writer.read_all().expect("failed to read records");
    assert_eq!(records, written);
    assert_eq!(records[2].result.final_value.as_deref(), Some("720.000000"));
}

#[test]
fn test_append_does_not_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("append_test.jsonl");

    JsonlWriter::new(&path).append(&make_test_record(EngineId::Lisp)).unwrap();
    let reopened = JsonlWriter::new(&path);
    reopened.append(&make_test_record(EngineId::Monkey)).unwrap();

    let records = reopened.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].engine_id, "lisp");
    assert_eq!(records[1].engine_id, "monkey");
}

#[test]
fn test_read_filtered_by_engine() {
    let dir = tempfile::tempdir().unwrap();
    let writer = JsonlWriter::new(dir.path().join("filtered.jsonl"));
    for id in [EngineId::Basic, EngineId::EvalFilter, EngineId::Basic] {
        writer.append(&make_test_record(id)).unwrap();
    }

    let basic = writer.read_filtered(Some("basic")).unwrap();
    assert_eq!(basic.len(), 2);
    assert!(basic.iter().all(|r| r.result.matched_expected));
    assert!(writer.read_filtered(Some("cobol")).unwrap().is_empty());
    assert_eq!(writer.read_filtered(None).unwrap().len(), 3);
}

#[test]
fn test_read_nonexistent_file_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let writer = JsonlWriter::new(dir.path().join("does_not_exist.jsonl"));

    assert!(!writer.exists());
    assert_eq!(writer.count().unwrap(), 0);
    let err = writer.read_all().unwrap_err();
    assert!(err.to_string().contains("file not found"));
}

#[test]
fn test_corrupt_line_reports_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.jsonl");
    let writer = JsonlWriter::new(&path);
    writer.append(&make_test_record(EngineId::Native)).unwrap();
    let mut text = std::fs::read_to_string(&path).unwrap();
    text.push_str("\n{not json}\n");
    std::fs::write(&path, text).unwrap();

    let err = writer.read_all().unwrap_err();
    assert!(err.to_string().contains("line 3"), "{err}");
}
