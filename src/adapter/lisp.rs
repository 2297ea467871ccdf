use crate::engines::lisp::{Environment, Interpreter, STDLIB, Value, populate_environment};

use super::traits::{EngineAdapter, TrialError};

/// Lisp interpreter plus the environment it evaluates in. The environment is
/// created once per trial and reused across evaluations.
pub struct LispHandle {
    interpreter: Interpreter,
    env: Environment,
}

pub struct LispAdapter;

impl EngineAdapter for LispAdapter {
    type Handle = LispHandle;
    type Raw = Value;

    fn engine_id(&self) -> &str {
        "lisp"
    }

    fn init(&self, source: &str) -> Result<LispHandle, TrialError> {
        let env = Environment::new();
        populate_environment(&env);
        let interpreter = Interpreter::new(&format!("{STDLIB}\n{source}")).map_err(TrialError::init)?;
        Ok(LispHandle { interpreter, env })
    }

    fn run(&self, handle: &mut LispHandle) -> Result<Value, TrialError> {
        match handle.interpreter.evaluate(&handle.env) {
            Value::Error(msg) => Err(TrialError::Eval(msg)),
            value => Ok(value),
        }
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
    fn test_lisp_fixture_repeats() {
        let f = fixture_for(EngineId::Lisp, 12);
        let mut h = LispAdapter.init(&f.source).unwrap();
        for _ in 0..3 {
            let raw = LispAdapter.run(&mut h).unwrap();
            assert_eq!(LispAdapter.extract(raw).unwrap(), "479001600");
        }
    }

    #[test]
    fn test_error_value_becomes_eval_error() {
        let mut h = LispAdapter.init("(undefined-thing 1)").unwrap();
        assert!(matches!(LispAdapter.run(&mut h), Err(TrialError::Eval(_))));
    }

    #[test]
    fn test_unreadable_source_fails_init() {
        assert!(matches!(LispAdapter.init("(fact 12"), Err(TrialError::Init(_))));
    }
}
