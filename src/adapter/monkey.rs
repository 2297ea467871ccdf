use crate::engines::monkey::{self, Environment, Lexer, Object, Parser, Program};

use super::traits::{EngineAdapter, TrialError};

/// A parsed monkey program and the environment it runs in.
pub struct MonkeyHandle {
    program: Program,
    env: Environment,
}

pub struct MonkeyAdapter;

impl EngineAdapter for MonkeyAdapter {
    type Handle = MonkeyHandle;
    type Raw = Object;

    fn engine_id(&self) -> &str {
        "monkey"
    }

    fn init(&self, source: &str) -> Result<MonkeyHandle, TrialError> {
        let mut parser = Parser::new(Lexer::new(source));
        let program = parser.parse_program();
        if !parser.errors().is_empty() {
            return Err(TrialError::Init(parser.errors().join("; ")));
        }
        Ok(MonkeyHandle { program, env: Environment::new() })
    }

    fn run(&self, handle: &mut MonkeyHandle) -> Result<Object, TrialError> {
        match monkey::eval(&handle.program, &handle.env) {
            Object::Error(msg) => Err(TrialError::Eval(msg)),
            value => Ok(value),
        }
    }

    fn extract(&self, raw: Object) -> Result<String, TrialError> {
        match raw {
            Object::Integer(n) => Ok(n.to_string()),
            other => Err(TrialError::Extract(format!("expected an integer, got {}", other.inspect()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::EngineId;
    use crate::fixtures::fixture_for;

    #[test]
    fn test_monkey_fixture_repeats() {
        let f = fixture_for(EngineId::Monkey, 12);
        let mut h = MonkeyAdapter.init(&f.source).unwrap();
        for _ in 0..3 {
            let raw = MonkeyAdapter.run(&mut h).unwrap();
            assert_eq!(MonkeyAdapter.extract(raw).unwrap(), "479001600");
        }
    }

    #[test]
    fn test_parse_errors_fail_init() {
        let err = MonkeyAdapter.init("let = ;").err().unwrap();
        assert!(matches!(err, TrialError::Init(ref m) if !m.is_empty()));
    }

    #[test]
    fn test_error_object_becomes_eval_error() {
        let mut h = MonkeyAdapter.init("nope(1);").unwrap();
        assert!(matches!(MonkeyAdapter.run(&mut h), Err(TrialError::Eval(_))));
    }
}
