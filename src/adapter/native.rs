//! Native recursive factorial, the reference every engine is compared to.

use crate::baseline;

use super::traits::{EngineAdapter, TrialError};

pub struct NativeAdapter;

/// Computed factorial; machine word while it fits.
pub enum NativeValue {
    Word(u64),
    Big(baseline::Natural),
}

impl EngineAdapter for NativeAdapter {
    /// The parsed N.
    type Handle = u64;
    type Raw = NativeValue;

    fn engine_id(&self) -> &str {
        "native"
    }

    fn init(&self, source: &str) -> Result<u64, TrialError> {
        source
            .trim()
            .parse()
            .map_err(|e| TrialError::Init(format!("expected N, got `{}`: {e}", source.trim())))
    }

    fn run(&self, n: &mut u64) -> Result<NativeValue, TrialError> {
        let n = std::hint::black_box(*n);
        Ok(match baseline::fact(n) {
            Some(v) => NativeValue::Word(v),
            None => NativeValue::Big(baseline::fact_exact(n)),
        })
    }

    fn extract(&self, raw: NativeValue) -> Result<String, TrialError> {
        Ok(match raw {
            NativeValue::Word(v) => v.to_string(),
            NativeValue::Big(v) => v.to_string(),
        })
    }
}
