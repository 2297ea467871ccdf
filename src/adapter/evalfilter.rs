use crate::engines::evalfilter::{Eval, Value};

use super::traits::{EngineAdapter, TrialError};

/// C-like filter scripts. Compiled once in `init`, executed per iteration.
pub struct EvalFilterAdapter;

impl EngineAdapter for EvalFilterAdapter {
    type Handle = Eval;
    type Raw = Value;

    fn engine_id(&self) -> &str {
        "evalfilter"
    }

    fn init(&self, source: &str) -> Result<Eval, TrialError> {
        let mut eval = Eval::new(source);
        eval.prepare().map_err(TrialError::init)?;
        Ok(eval)
    }

    fn run(&self, eval: &mut Eval) -> Result<Value, TrialError> {
        eval.execute().map_err(TrialError::eval)
    }

    fn extract(&self, raw: Value) -> Result<String, TrialError> {
        match raw {
            Value::Int(n) => Ok(n.to_string()),
            other => Err(TrialError::Extract(format!("expected an integer, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::EngineId;
    use crate::fixtures::fixture_for;

    #[test]
    fn test_evalfilter_fixture_repeats() {
        let f = fixture_for(EngineId::EvalFilter, 12);
        let mut h = EvalFilterAdapter.init(&f.source).unwrap();
        for _ in 0..3 {
            let raw = EvalFilterAdapter.run(&mut h).unwrap();
            assert_eq!(EvalFilterAdapter.extract(raw).unwrap(), "479001600");
        }
    }

    #[test]
    fn test_compile_errors_fail_init() {
        assert!(matches!(EvalFilterAdapter.init("return fact(12);"), Err(TrialError::Init(_))));
    }

    #[test]
    fn test_non_integer_result_fails_extract() {
        let mut h = EvalFilterAdapter.init("return true;").unwrap();
        let raw = EvalFilterAdapter.run(&mut h).unwrap();
        assert!(matches!(EvalFilterAdapter.extract(raw), Err(TrialError::Extract(_))));
    }
}
