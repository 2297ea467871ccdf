//! `run` command: stdout lines, exit code, config overrides and persistence.

use interp_bench::adapter::EngineId;
use interp_bench::config::CliOverrides;
use interp_bench::core::TrialStatus;
use interp_bench::fixtures::MAX_N;
use interp_bench::report::OutputFormat;
use interp_bench::run_cmd::{RunArgs, execute};
use interp_bench::storage::JsonlWriter;

fn args(engines: &[&str], iterations: u32) -> RunArgs {
    RunArgs {
        overrides: CliOverrides {
            iterations: Some(iterations),
            engines: engines.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn lines(buf: &[u8]) -> Vec<serde_json::Value> {
    std::str::from_utf8(buf)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_json_line_per_engine() {
    let mut out = Vec::new();
    let outcome = execute(&args(&[], 2), &mut out).unwrap();
    let lines = lines(&out);
    assert_eq!(lines.len(), EngineId::ALL.len());
    for (line, id) in lines.iter().zip(EngineId::ALL) {
        assert_eq!(line["engine_id"], id.as_str());
        assert_eq!(line["status"], "ok");
        assert_eq!(line["iterations"], 2);
        assert_eq!(line["matched_expected"], true);
    }
    assert_eq!(outcome.exit_code(), 0);
}

#[test]
fn test_text_format() {
    let mut a = args(&["native", "tcl"], 5);
    a.format = OutputFormat::Text;
    let mut out = Vec::new();
    execute(&a, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().nth(2).unwrap().starts_with("tcl"));
}

#[test]
fn test_broken_fixture_fails_only_its_engine() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("bench.toml");
    std::fs::write(
        &cfg,
        "[harness]\nengines = [\"tcl\", \"lisp\", \"monkey\"]\n\n[[fixture]]\nengine = \"lisp\"\nsource = \"(define fact\"\n",
    )
    .unwrap();

    let mut a = args(&[], 3);
    a.overrides.engines.clear();
    a.config = Some(cfg);
    let mut out = Vec::new();
    let outcome = execute(&a, &mut out).unwrap();

    let lines = lines(&out);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["engine_id"], "lisp");
    assert_eq!(lines[1]["status"], "init_failed");
    assert!(lines[1]["error"].as_str().unwrap().starts_with("init failed"));
    assert_eq!(lines[0]["status"], "ok");
    assert_eq!(lines[2]["status"], "ok");
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn test_malformed_forth_fails_init() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("bench.toml");
    std::fs::write(
        &cfg,
        "[harness]\nengines = [\"forth\"]\n\n[[fixture]]\nengine = \"forth\"\nsource = \": f 1\"\n",
    )
    .unwrap();

    let mut a = args(&[], 3);
    a.config = Some(cfg);
    let mut out = Vec::new();
    let outcome = execute(&a, &mut out).unwrap();

    let lines = lines(&out);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["status"], "init_failed");
    assert!(lines[0]["error"].as_str().unwrap().contains("unterminated definition"));
    assert_eq!(outcome.results[0].iterations, 0);
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn test_fixture_path_resolves_next_to_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("fact.tcl"), "proc f {n} { return [* $n 2] }\nf 21\n").unwrap();
    let cfg = dir.path().join("bench.toml");
    std::fs::write(
        &cfg,
        "[harness]\nengines = [\"tcl\"]\n\n[[fixture]]\nengine = \"tcl\"\npath = \"fact.tcl\"\nexpected = \"42\"\n",
    )
    .unwrap();

    let mut a = args(&[], 1);
    a.config = Some(cfg);
    let outcome = execute(&a, &mut Vec::new()).unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].matched_expected, "{:?}", outcome.results[0]);
}

#[test]
fn test_overflow_is_incomplete_but_exit_zero() {
    let mut a = args(&["evalfilter"], 4);
    a.overrides.n = Some(30);
    let mut out = Vec::new();
    let outcome = execute(&a, &mut out).unwrap();
    assert_eq!(outcome.results[0].status, TrialStatus::Incomplete);
    assert_eq!(lines(&out)[0]["incomplete"], true);
    assert_eq!(outcome.exit_code(), 0);
}

#[test]
fn test_records_persisted_to_jsonl_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    let jsonl = dir.path().join("runs/trials.jsonl");
    let csv = dir.path().join("runs/trials.csv");

    let mut a = args(&["native", "forth"], 2);
    a.jsonl = Some(jsonl.clone());
    a.csv = Some(csv.clone());
    execute(&a, &mut Vec::new()).unwrap();
    execute(&a, &mut Vec::new()).unwrap();

    let writer = JsonlWriter::new(&jsonl);
    assert_eq!(writer.count().unwrap(), 4);
    let forth = writer.read_filtered(Some("forth")).unwrap();
    assert_eq!(forth.len(), 2);
    assert_eq!(forth[0].result.final_value.as_deref(), Some("479001600.000000"));
    assert_eq!(forth[0].config.measured_iterations, 2);
    assert_eq!(forth[0].source_sha256.len(), 64);

    // CSV is rewritten, not appended.
    let text = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn test_zero_iterations_rejected() {
    assert!(execute(&args(&[], 0), &mut Vec::new()).is_err());
}

#[test]
fn test_largest_n_completes_with_a_line_per_engine() {
    let mut a = args(&["native", "evalfilter"], 1);
    a.overrides.n = Some(MAX_N);
    let mut out = Vec::new();
    let outcome = execute(&a, &mut out).unwrap();

    assert_eq!(lines(&out).len(), 2);
    assert_eq!(outcome.results[0].status, TrialStatus::Ok);
    assert!(outcome.results[0].matched_expected);
    assert_eq!(outcome.results[1].status, TrialStatus::Incomplete);
    assert_eq!(outcome.exit_code(), 0);
}

#[test]
fn test_n_above_bound_is_rejected_before_any_trial() {
    let mut a = args(&["tcl"], 1);
    a.overrides.n = Some(200_000);
    let mut out = Vec::new();
    assert!(execute(&a, &mut out).is_err());
    assert!(out.is_empty());
}
