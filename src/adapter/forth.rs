use crate::core::Caveat;
use crate::engines::forth::Forth;

use super::traits::{EngineAdapter, Lifecycle, TrialError};

/// A fresh Forth machine and the program it will evaluate.
pub struct ForthHandle {
    forth: Forth,
    source: String,
}

/// Stack-based Forth. Source is interpreted on every `run`, and `reset` keeps
/// definitions around, so each evaluation gets a new machine.
pub struct ForthAdapter;

impl EngineAdapter for ForthAdapter {
    type Handle = ForthHandle;
    type Raw = f64;

    fn engine_id(&self) -> &str {
        "forth"
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::ColdOnly
    }

    fn caveats(&self) -> Vec<Caveat> {
        vec![Caveat::ParseInsideRun, Caveat::ResetUnreliable, Caveat::FloatAccumulator]
    }

    fn init(&self, source: &str) -> Result<ForthHandle, TrialError> {
        Forth::check(source).map_err(TrialError::init)?;
        Ok(ForthHandle { forth: Forth::new(), source: source.to_string() })
    }

    fn run(&self, handle: &mut ForthHandle) -> Result<f64, TrialError> {
        handle.forth.eval(&handle.source).map_err(TrialError::eval)?;
        handle.forth.stack.pop().map_err(TrialError::extract)
    }

    fn extract(&self, raw: f64) -> Result<String, TrialError> {
        Ok(format!("{raw:.6}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::EngineId;
    use crate::fixtures::fixture_for;

    #[test]
    fn test_forth_fixture_result() {
        let f = fixture_for(EngineId::Forth, 12);
        let mut h = ForthAdapter.init(&f.source).unwrap();
        let raw = ForthAdapter.run(&mut h).unwrap();
        assert_eq!(ForthAdapter.extract(raw).unwrap(), "479001600.000000");
    }

    #[test]
    fn test_empty_stack_is_an_error_not_zero() {
        let mut h = ForthAdapter.init(": noop ;").unwrap();
        assert!(matches!(ForthAdapter.run(&mut h), Err(TrialError::Extract(_))));
    }

    #[test]
    fn test_unknown_word_is_eval_error() {
        let mut h = ForthAdapter.init("1 frobnicate").unwrap();
        assert!(matches!(ForthAdapter.run(&mut h), Err(TrialError::Eval(_))));
    }

    #[test]
    fn test_malformed_definitions_fail_init() {
        for source in [": f 1", ": f if 1 ;", ":", "1 then", "( open comment"] {
            let err = ForthAdapter.init(source).err();
            assert!(matches!(err, Some(TrialError::Init(_))), "{source}: {err:?}");
        }
    }
}
