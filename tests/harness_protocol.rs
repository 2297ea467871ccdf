//! End-to-end trial protocol across the real engines.

use interp_bench::adapter::{Benchmark, EngineId, MockAdapter, MockConfig, benchmark_for};
use interp_bench::core::{Caveat, TrialMode, TrialStatus};
use interp_bench::engines::forth::{Forth, ForthError};
use interp_bench::fixtures::{catalog, fixture_for};
use interp_bench::harness::{TrialPlan, run_trial};

#[test]
fn test_every_engine_matches_at_12_warm() {
    let plan = TrialPlan::new(1);
    for fixture in catalog(12) {
        let r = benchmark_for(fixture.engine_id).run_trial(&fixture, &plan);
        assert_eq!(r.status, TrialStatus::Ok, "{}: {:?}", fixture.engine_id, r.error);
        assert!(r.matched_expected, "{}: got {:?}", fixture.engine_id, r.final_value);
        assert_eq!(r.iterations, 1);
    }
}

#[test]
fn test_every_engine_matches_at_12_cold() {
    let plan = TrialPlan::new(3).with_mode(TrialMode::Cold).with_warmup(1);
    for fixture in catalog(12) {
        let r = benchmark_for(fixture.engine_id).run_trial(&fixture, &plan);
        assert!(r.matched_expected, "{}: got {:?}", fixture.engine_id, r.final_value);
        assert_eq!(r.iterations, 3);
        assert!(r.has_caveat(Caveat::SetupPerIteration));
    }
}

#[test]
fn test_repeated_warm_evaluation_is_stable() {
    let plan = TrialPlan::new(25);
    for fixture in catalog(10) {
        let r = benchmark_for(fixture.engine_id).run_trial(&fixture, &plan);
        assert!(r.matched_expected, "{} drifted: {:?}", fixture.engine_id, r.final_value);
        assert_eq!(r.iterations, 25);
    }
}

#[test]
fn test_results_are_deterministic_across_fresh_handles() {
    let plan = TrialPlan::new(2);
    for fixture in catalog(12) {
        let bench = benchmark_for(fixture.engine_id);
        let a = bench.run_trial(&fixture, &plan);
        let b = bench.run_trial(&fixture, &plan);
        assert_eq!(a.final_value, b.final_value, "{}", fixture.engine_id);
    }
}

#[test]
fn test_forced_cold_engines() {
    let plan = TrialPlan::new(2);
    for id in [EngineId::Forth, EngineId::Basic] {
        let r = benchmark_for(id).run_trial(&fixture_for(id, 12), &plan);
        assert_eq!(r.mode, TrialMode::Cold, "{id}");
        assert!(r.setup_per_iteration);
        assert!(r.has_caveat(Caveat::FloatAccumulator));
    }
    let forth = benchmark_for(EngineId::Forth).run_trial(&fixture_for(EngineId::Forth, 12), &plan);
    assert!(forth.has_caveat(Caveat::ResetUnreliable));
    assert!(forth.has_caveat(Caveat::ParseInsideRun));
}

#[test]
fn test_factorial_100() {
    let plan = TrialPlan::new(1);
    for fixture in catalog(100) {
        let r = benchmark_for(fixture.engine_id).run_trial(&fixture, &plan);
        match fixture.engine_id {
            EngineId::Native | EngineId::Basic | EngineId::Forth => {
                assert!(r.matched_expected, "{}: {:?}", fixture.engine_id, r.final_value)
            }
            // i64 engines overflow; the trial is reported, not aborted.
            _ => {
                assert_eq!(r.status, TrialStatus::Incomplete, "{}", fixture.engine_id);
                assert_eq!(r.iterations, 0);
                assert!(!r.matched_expected);
            }
        }
    }
    let native = fixture_for(EngineId::Native, 100);
    assert_eq!(native.expected.len(), 158);
    assert!(native.expected.ends_with(&"0".repeat(24)));
    let forth = fixture_for(EngineId::Forth, 100);
    assert!(forth.expected.starts_with("93326215443944"));
    assert!(forth.expected.ends_with("813248.000000"));
}

#[test]
fn test_incomplete_trial_accounting() {
    let mock = MockAdapter::new(MockConfig::new("flaky").fail_on_run(6));
    let r = run_trial(&mock, "", 12, &TrialPlan::new(100));
    assert_eq!(r.iterations, 5);
    assert_eq!(r.requested_iterations, 100);
    assert!(r.incomplete);
}

#[test]
fn test_init_failure_is_isolated() {
    let broken = fixture_for(EngineId::Lisp, 12).with_source("(define fact");
    let plan = TrialPlan::new(2);
    let failed = benchmark_for(EngineId::Lisp).run_trial(&broken, &plan);
    assert_eq!(failed.status, TrialStatus::InitFailed);
    assert_eq!(failed.iterations, 0);

    let next = benchmark_for(EngineId::Tcl).run_trial(&fixture_for(EngineId::Tcl, 12), &plan);
    assert!(next.matched_expected);
}

#[test]
fn test_mismatch_does_not_abort() {
    let wrong = fixture_for(EngineId::Monkey, 12).with_expected("42");
    let r = benchmark_for(EngineId::Monkey).run_trial(&wrong, &TrialPlan::new(3));
    assert_eq!(r.status, TrialStatus::Ok);
    assert_eq!(r.iterations, 3);
    assert!(!r.matched_expected);
}

#[test]
fn test_forth_stack_holds_exactly_one_result() {
    let mut forth = Forth::new();
    forth.eval(&fixture_for(EngineId::Forth, 12).source).unwrap();
    assert_eq!(forth.stack.pop(), Ok(479001600.0));
    assert_eq!(forth.stack.pop(), Err(ForthError::EmptyStack));
}

#[test]
fn test_boxed_benchmarks_report_their_ids() {
    let all: Vec<Box<dyn Benchmark>> = EngineId::ALL.into_iter().map(benchmark_for).collect();
    let ids: Vec<&str> = all.iter().map(|b| b.engine_id()).collect();
    assert_eq!(ids, ["native", "basic", "tcl", "lisp", "forth", "evalfilter", "monkey"]);
}
