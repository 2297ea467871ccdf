//! TrialRecord schema v1: one record per engine trial.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::env::EnvironmentInfo;

/// Schema version for forward compatibility
pub const SCHEMA_VERSION: u32 = 1;

/// Engine lifecycle used for a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TrialMode {
    /// One engine instance, evaluated repeatedly.
    #[default]
    Warm,
    /// A fresh engine per iteration.
    Cold,
}

impl TrialMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TrialMode::Warm => "warm",
            TrialMode::Cold => "cold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Ok,
    Incomplete,
    InitFailed,
}

impl TrialStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrialStatus::Ok => "ok",
            TrialStatus::Incomplete => "incomplete",
            TrialStatus::InitFailed => "init_failed",
        }
    }
}

/// Known ways a trial's numbers are not directly comparable to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Caveat {
    /// Engine construction happened once per iteration (cold start).
    SetupPerIteration,
    /// Construction time was folded into the eval clock.
    SetupInEvalClock,
    /// The engine parses its source on every evaluation.
    ParseInsideRun,
    /// The engine's reset does not restore a clean state.
    ResetUnreliable,
    /// Arithmetic is f64, so large N loses precision.
    FloatAccumulator,
}

impl Caveat {
    pub fn as_str(self) -> &'static str {
        match self {
            Caveat::SetupPerIteration => "setup_per_iteration",
            Caveat::SetupInEvalClock => "setup_in_eval_clock",
            Caveat::ParseInsideRun => "parse_inside_run",
            Caveat::ResetUnreliable => "reset_unreliable",
            Caveat::FloatAccumulator => "float_accumulator",
        }
    }
}

/// Outcome of one engine trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub engine_id: String,
    pub n: u32,
    pub mode: TrialMode,
    pub requested_iterations: u32,
    /// Iterations that completed successfully.
    pub iterations: u32,
    #[serde(rename = "setup_time_ns", with = "duration_ns")]
    pub total_setup_time: Duration,
    pub setup_per_iteration: bool,
    #[serde(rename = "eval_time_ns", with = "duration_ns")]
    pub total_eval_time: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_value: Option<String>,
    pub matched_expected: bool,
    pub incomplete: bool,
    pub status: TrialStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub caveats: Vec<Caveat>,
}

impl TrialResult {
    /// Result for a trial whose engine never initialised.
    pub fn init_failed(engine_id: &str, n: u32, mode: TrialMode, requested: u32, error: String) -> Self {
        TrialResult {
            engine_id: engine_id.to_string(),
            n,
            mode,
            requested_iterations: requested,
            iterations: 0,
            total_setup_time: Duration::ZERO,
            setup_per_iteration: mode == TrialMode::Cold,
            total_eval_time: Duration::ZERO,
            final_value: None,
            matched_expected: false,
            incomplete: true,
            status: TrialStatus::InitFailed,
            error: Some(error),
            caveats: Vec::new(),
        }
    }

    /// Mean eval nanoseconds per completed iteration.
    pub fn mean_eval_ns(&self) -> Option<f64> {
        (self.iterations > 0).then(|| self.total_eval_time.as_nanos() as f64 / self.iterations as f64)
    }

    /// Completed iterations per second of eval time.
    pub fn throughput_per_sec(&self) -> Option<f64> {
        let secs = self.total_eval_time.as_secs_f64();
        (self.iterations > 0 && secs > 0.0).then(|| self.iterations as f64 / secs)
    }

    pub fn has_caveat(&self, caveat: Caveat) -> bool {
        self.caveats.contains(&caveat)
    }
}

/// Harness settings a trial ran under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub warmup_iterations: u32,
    pub measured_iterations: u32,
    pub n: u32,
    pub mode: TrialMode,
    pub include_setup: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            warmup_iterations: 0,
            measured_iterations: 1000,
            n: 12,
            mode: TrialMode::Warm,
            include_setup: false,
        }
    }
}

/// Persisted form of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub schema_version: u32,

    /// Unique identifier for this record
    pub record_id: String,

    /// RFC 3339 timestamp
    pub timestamp: String,

    pub engine_id: String,

    /// sha256 of the fixture source the engine ran
    pub source_sha256: String,

    pub env: EnvironmentInfo,

    pub config: RunConfig,

    pub result: TrialResult,
}

impl TrialRecord {
    pub fn new(source: &str, env: EnvironmentInfo, config: RunConfig, result: TrialResult) -> Self {
        let timestamp = crate::now_string();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let record_id = format!(
            "{:x}-{}-{}",
            nanos,
            timestamp.get(..19).unwrap_or_default().replace([':', '-', 'T'], ""),
            result.engine_id
        );

        TrialRecord {
            schema_version: SCHEMA_VERSION,
            record_id,
            timestamp,
            engine_id: result.engine_id.clone(),
            source_sha256: crate::sha256_hex(source.as_bytes()),
            env,
            config,
            result,
        }
    }
}

mod duration_ns {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrialResult {
        TrialResult {
            engine_id: "tcl".into(),
            n: 12,
            mode: TrialMode::Warm,
            requested_iterations: 4,
            iterations: 4,
            total_setup_time: Duration::from_micros(30),
            setup_per_iteration: false,
            total_eval_time: Duration::from_millis(2),
            final_value: Some("479001600".into()),
            matched_expected: true,
            incomplete: false,
            status: TrialStatus::Ok,
            error: None,
            caveats: vec![Caveat::ParseInsideRun],
        }
    }

    #[test]
    fn test_durations_serialize_as_nanoseconds() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["setup_time_ns"], 30_000);
        assert_eq!(v["eval_time_ns"], 2_000_000);
        assert_eq!(v["mode"], "warm");
        assert_eq!(v["caveats"][0], "parse_inside_run");
        let back: TrialResult = serde_json::from_value(v).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_mean_and_throughput() {
        let r = sample();
        assert_eq!(r.mean_eval_ns(), Some(500_000.0));
        assert!((r.throughput_per_sec().unwrap() - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_init_failed_has_no_timing() {
        let r = TrialResult::init_failed("lisp", 12, TrialMode::Warm, 10, "boom".into());
        assert_eq!(r.status, TrialStatus::InitFailed);
        assert_eq!(r.iterations, 0);
        assert_eq!(r.mean_eval_ns(), None);
        assert_eq!(r.throughput_per_sec(), None);
        assert_eq!(r.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_record_id_and_hash() {
        let rec = TrialRecord::new("1 2 +", EnvironmentInfo::default(), RunConfig::default(), sample());
        assert_eq!(rec.schema_version, SCHEMA_VERSION);
        assert!(rec.record_id.ends_with("-tcl"));
        assert_eq!(rec.source_sha256.len(), 64);
        assert_eq!(rec.engine_id, "tcl");
    }
}
