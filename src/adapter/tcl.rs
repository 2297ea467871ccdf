use crate::engines::tcl::{Interpreter, STDLIB, TclError};

use super::traits::{EngineAdapter, TrialError};

/// TCL-like interpreter with its bundled stdlib prepended to the script.
pub struct TclAdapter;

impl EngineAdapter for TclAdapter {
    type Handle = Interpreter;
    type Raw = String;

    fn engine_id(&self) -> &str {
        "tcl"
    }

    fn init(&self, source: &str) -> Result<Interpreter, TrialError> {
        Interpreter::new(&format!("{STDLIB}\n{source}")).map_err(TrialError::init)
    }

    fn run(&self, interp: &mut Interpreter) -> Result<String, TrialError> {
        match interp.evaluate() {
            Ok(value) => Ok(value),
            // A top-level `return` ends the script with its value.
            Err(TclError::Return(value)) => Ok(value),
            Err(e) => Err(TrialError::eval(e)),
        }
    }

    fn extract(&self, raw: String) -> Result<String, TrialError> {
        if raw.is_empty() {
            return Err(TrialError::Extract("script produced no value".into()));
        }
        Ok(raw)
    }
}
