//! Engine adapters and the registry that maps engine ids to them.

pub mod basic;
pub mod evalfilter;
pub mod forth;
pub mod lisp;
pub mod mock;
pub mod monkey;
pub mod native;
pub mod tcl;
pub mod traits;

use std::fmt;
use std::str::FromStr;

use crate::BenchError;

pub use basic::BasicAdapter;
pub use evalfilter::EvalFilterAdapter;
pub use forth::ForthAdapter;
pub use lisp::LispAdapter;
pub use mock::{MockAdapter, MockConfig};
pub use monkey::MonkeyAdapter;
pub use native::NativeAdapter;
pub use tcl::TclAdapter;
pub use traits::{Benchmark, EngineAdapter, Lifecycle, TrialError};

/// How an engine represents numbers, which decides its expected output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numeric {
    /// Exact integers, rendered without decimals.
    Exact,
    /// f64, rendered with six decimals.
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineId {
    Native,
    Basic,
    Tcl,
    Lisp,
    Forth,
    EvalFilter,
    Monkey,
}

impl EngineId {
    /// Every engine, in report order. The baseline runs first.
    pub const ALL: [EngineId; 7] = [
        EngineId::Native,
        EngineId::Basic,
        EngineId::Tcl,
        EngineId::Lisp,
        EngineId::Forth,
        EngineId::EvalFilter,
        EngineId::Monkey,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EngineId::Native => "native",
            EngineId::Basic => "basic",
            EngineId::Tcl => "tcl",
            EngineId::Lisp => "lisp",
            EngineId::Forth => "forth",
            EngineId::EvalFilter => "evalfilter",
            EngineId::Monkey => "monkey",
        }
    }

    pub fn numeric(self) -> Numeric {
        match self {
            EngineId::Basic | EngineId::Forth => Numeric::Float,
            _ => Numeric::Exact,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            EngineId::Native => "native recursive factorial (baseline)",
            EngineId::Basic => "line-numbered BASIC with GOSUB",
            EngineId::Tcl => "TCL-like with prefix arithmetic",
            EngineId::Lisp => "Lisp with an explicit environment",
            EngineId::Forth => "stack-based Forth",
            EngineId::EvalFilter => "C-like script compiled to bytecode",
            EngineId::Monkey => "monkey-style tree-walking script",
        }
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineId {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EngineId::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BenchError::UnknownEngine(s.to_string()))
    }
}

/// The adapter for an engine, boxed behind the object-safe trait.
pub fn benchmark_for(id: EngineId) -> Box<dyn Benchmark> {
    match id {
        EngineId::Native => Box::new(NativeAdapter),
        EngineId::Basic => Box::new(BasicAdapter),
        EngineId::Tcl => Box::new(TclAdapter),
        EngineId::Lisp => Box::new(LispAdapter),
        EngineId::Forth => Box::new(ForthAdapter),
        EngineId::EvalFilter => Box::new(EvalFilterAdapter),
        EngineId::Monkey => Box::new(MonkeyAdapter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_id_round_trips_through_str() {
        for id in EngineId::ALL {
            assert_eq!(id.as_str().parse::<EngineId>().unwrap(), id);
            assert_eq!(benchmark_for(id).engine_id(), id.as_str());
        }
        assert_eq!("EvalFilter".parse::<EngineId>().unwrap(), EngineId::EvalFilter);
    }

    #[test]
    fn test_unknown_engine() {
        let err = "cobol".parse::<EngineId>().unwrap_err();
        assert_eq!(err.to_string(), "unknown engine `cobol`");
    }
}
