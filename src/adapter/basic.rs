use crate::core::Caveat;
use crate::engines::basic::{Interpreter, Value};

use super::traits::{EngineAdapter, Lifecycle, TrialError};

/// Line-numbered BASIC. The interpreter has no reset, so every evaluation
/// needs a freshly parsed program. The result is read from variable `F`.
pub struct BasicAdapter;

impl EngineAdapter for BasicAdapter {
    type Handle = Interpreter;
    type Raw = Value;

    fn engine_id(&self) -> &str {
        "basic"
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::ColdOnly
    }

    fn caveats(&self) -> Vec<Caveat> {
        vec![Caveat::FloatAccumulator]
    }

    fn init(&self, source: &str) -> Result<Interpreter, TrialError> {
        Interpreter::new(source).map_err(TrialError::init)
    }

    fn run(&self, interp: &mut Interpreter) -> Result<Value, TrialError> {
        interp.run().map_err(TrialError::eval)?;
        interp
            .get_variable("F")
            .cloned()
            .ok_or_else(|| TrialError::Extract("variable F is not set".into()))
    }

    fn extract(&self, raw: Value) -> Result<String, TrialError> {
        match raw {
            Value::Number(n) => Ok(format!("{n:.6}")),
            Value::Str(s) => Err(TrialError::Extract(format!("F holds a string: {s:?}"))),
        }
    }
}
