//! Exact string comparison of a trial's final value against its fixture.

use tracing::warn;

use crate::core::{TrialResult, TrialStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub matched: bool,
    pub expected: String,
    pub actual: Option<String>,
}

/// No normalisation: `"479001600"` and `"479001600.000000"` differ.
pub fn verify(expected: &str, actual: Option<&str>) -> Verification {
    Verification {
        matched: actual == Some(expected),
        expected: expected.to_string(),
        actual: actual.map(str::to_string),
    }
}

/// Record the verdict on `result`, warning on a mismatch. Never fails.
pub fn apply(result: &mut TrialResult, expected: &str) -> Verification {
    let v = verify(expected, result.final_value.as_deref());
    result.matched_expected = v.matched;
    if !v.matched && result.status != TrialStatus::InitFailed {
        warn!(
            engine = %result.engine_id,
            expected = %v.expected,
            actual = v.actual.as_deref().unwrap_or("<none>"),
            "result does not match expected value"
        );
    }
    v
}
