//! Per-engine result lines for stdout.

use serde::Serialize;

use crate::BenchResult;
use crate::core::{Caveat, TrialMode, TrialResult, TrialStatus};

/// JSON line for a trial that got past initialisation.
#[derive(Debug, Serialize)]
struct ResultLine<'a> {
    engine_id: &'a str,
    status: TrialStatus,
    n: u32,
    mode: TrialMode,
    iterations: u32,
    requested_iterations: u32,
    setup_time_ns: u64,
    eval_time_ns: u64,
    setup_per_iteration: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    mean_eval_ns: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_value: Option<&'a str>,
    matched_expected: bool,
    incomplete: bool,
    caveats: &'a [Caveat],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct InitFailedLine<'a> {
    engine_id: &'a str,
    status: TrialStatus,
    error: &'a str,
}

fn nanos(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// One compact JSON object, no trailing newline.
pub fn json_line(r: &TrialResult) -> BenchResult<String> {
    if r.status == TrialStatus::InitFailed {
        let line = InitFailedLine {
            engine_id: &r.engine_id,
            status: r.status,
            error: r.error.as_deref().unwrap_or_default(),
        };
        return Ok(serde_json::to_string(&line)?);
    }
    let line = ResultLine {
        engine_id: &r.engine_id,
        status: r.status,
        n: r.n,
        mode: r.mode,
        iterations: r.iterations,
        requested_iterations: r.requested_iterations,
        setup_time_ns: nanos(r.total_setup_time),
        eval_time_ns: nanos(r.total_eval_time),
        setup_per_iteration: r.setup_per_iteration,
        mean_eval_ns: r.mean_eval_ns(),
        final_value: r.final_value.as_deref(),
        matched_expected: r.matched_expected,
        incomplete: r.incomplete,
        caveats: &r.caveats,
        error: r.error.as_deref(),
    };
    Ok(serde_json::to_string(&line)?)
}

/// Human-readable duration for a per-iteration mean.
pub fn format_ns(ns: f64) -> String {
    if ns >= 1e9 {
        format!("{:.2} s", ns / 1e9)
    } else if ns >= 1e6 {
        format!("{:.2} ms", ns / 1e6)
    } else if ns >= 1e3 {
        format!("{:.2} us", ns / 1e3)
    } else {
        format!("{ns:.0} ns")
    }
}

/// Per-iteration cost relative to `baseline`, e.g. `x42.0`.
pub fn relative_overhead(r: &TrialResult, baseline: Option<&TrialResult>) -> Option<f64> {
    let base = baseline?.mean_eval_ns()?;
    let mine = r.mean_eval_ns()?;
    (base > 0.0).then(|| mine / base)
}

/// Aligned table, one row per trial. Overhead is shown against the `native`
/// trial when it is among `results`.
pub fn text_table(results: &[TrialResult]) -> String {
    let native = results.iter().find(|r| r.engine_id == "native" && r.iterations > 0);
    let mut out = format!(
        "{:<11} {:<11} {:<5} {:>8} {:>11} {:>13} {:>10} {:<5} {}\n",
        "engine", "status", "mode", "iters", "per iter", "iter/s", "vs native", "match", "notes"
    );
    for r in results {
        let per_iter = r.mean_eval_ns().map(format_ns).unwrap_or_else(|| "-".into());
        let throughput = r.throughput_per_sec().map(|t| format!("{t:.0}")).unwrap_or_else(|| "-".into());
        let overhead = relative_overhead(r, native).map(|x| format!("x{x:.1}")).unwrap_or_else(|| "-".into());
        let mut notes: Vec<&str> = r.caveats.iter().map(|c| c.as_str()).collect();
        if let Some(e) = &r.error {
            notes.push(e);
        }
        out.push_str(&format!(
            "{:<11} {:<11} {:<5} {:>8} {:>11} {:>13} {:>10} {:<5} {}\n",
            r.engine_id,
            r.status.as_str(),
            r.mode.as_str(),
            r.iterations,
            per_iter,
            throughput,
            overhead,
            if r.matched_expected { "yes" } else { "no" },
            notes.join(", "),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ok_result(engine: &str, iterations: u32, eval: Duration) -> TrialResult {
        TrialResult {
            engine_id: engine.into(),
            n: 12,
            mode: TrialMode::Warm,
            requested_iterations: iterations,
            iterations,
            total_setup_time: Duration::from_nanos(10),
            setup_per_iteration: false,
            total_eval_time: eval,
            final_value: Some("479001600".into()),
            matched_expected: true,
            incomplete: false,
            status: TrialStatus::Ok,
            error: None,
            caveats: Vec::new(),
        }
    }

    #[test]
    fn test_json_line_fields() {
        let line = json_line(&ok_result("tcl", 1000, Duration::from_micros(500))).unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["engine_id"], "tcl");
        assert_eq!(v["status"], "ok");
        assert_eq!(v["n"], 12);
        assert_eq!(v["mode"], "warm");
        assert_eq!(v["iterations"], 1000);
        assert_eq!(v["setup_time_ns"], 10);
        assert_eq!(v["eval_time_ns"], 500_000);
        assert_eq!(v["matched_expected"], true);
        assert!(v.get("error").is_none());
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_init_failed_line_is_minimal() {
        let r = TrialResult::init_failed("lisp", 12, TrialMode::Warm, 10, "init failed: read error".into());
        let v: serde_json::Value = serde_json::from_str(&json_line(&r).unwrap()).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"engine_id": "lisp", "status": "init_failed", "error": "init failed: read error"})
        );
    }

    #[test]
    fn test_relative_overhead_against_native() {
        let native = ok_result("native", 100, Duration::from_micros(1));
        let tcl = ok_result("tcl", 100, Duration::from_micros(50));
        assert_eq!(relative_overhead(&tcl, Some(&native)), Some(50.0));
        assert_eq!(relative_overhead(&tcl, None), None);
    }

    #[test]
    fn test_text_table_rows() {
        let results = vec![
            ok_result("native", 100, Duration::from_micros(1)),
            ok_result("monkey", 100, Duration::from_millis(2)),
        ];
        let table = text_table(&results);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("engine"));
        assert!(lines[2].starts_with("monkey"));
        assert!(lines[2].contains("20.00 us"));
        assert!(lines[2].contains("x2000.0"));
    }

    #[test]
    fn test_format_ns_units() {
        assert_eq!(format_ns(12.0), "12 ns");
        assert_eq!(format_ns(1_500.0), "1.50 us");
        assert_eq!(format_ns(2_500_000.0), "2.50 ms");
    }
}
