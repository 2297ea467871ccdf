//! Factorial programs for each engine, with the value they must produce.
//!
//! Expected values come from [`crate::baseline`], never from an engine.

use crate::adapter::{EngineId, Numeric};
use crate::baseline;

/// N used when none is given.
pub const DEFAULT_N: u32 = 12;

/// Largest N a run accepts. Expected values are computed exactly, and the
/// cost of that grows quadratically with N.
pub const MAX_N: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub engine_id: EngineId,
    pub n: u32,
    pub source: String,
    pub expected: String,
}

impl Fixture {
    /// Replace the program text, keeping the expected value.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = expected.into();
        self
    }
}

/// The value a correct engine of the given numeric model reports for `n!`.
pub fn expected_value(numeric: Numeric, n: u32) -> String {
    match numeric {
        Numeric::Exact => baseline::exact_decimal(u64::from(n)),
        Numeric::Float => format!("{:.6}", baseline::fact_f64(u64::from(n))),
    }
}

pub fn source_for(engine: EngineId, n: u32) -> String {
    match engine {
        EngineId::Native => n.to_string(),
        EngineId::Basic => format!(
            "10 LET F = 0
20 LET N = {n}
30 GOSUB 200
40 END
REM
REM Recursive factorial: set F=0 and N, then GOSUB 200. Result in F.
REM One statement per line, hence the doubled conditionals.
REM
200 IF N<0 THEN F=-1
210 IF N<0 THEN RETURN
220 IF N<2 THEN F=1
230 IF N<2 THEN RETURN
240 LET N = N - 1
250 GOSUB 200
260 LET N = N + 1
270 LET F = F * N
280 RETURN
"
        ),
        EngineId::Tcl => format!(
            "proc fact {{n}} {{
    if  {{<= $n 1}} {{
        return 1
    }} else {{
        return [* $n [fact [- $n 1]]]
    }}
}}
fact {n}
"
        ),
        EngineId::Lisp => format!(
            "(define fact (lambda (n)
  (if (<= n 1)
    1
      (* n (fact (- n 1))))))

(fact {n})
"
        ),
        EngineId::Forth => format!(
            ": factorial recursive  dup 1 >  if  dup 1 -  factorial *  then  ;
{n} factorial
"
        ),
        EngineId::EvalFilter | EngineId::Monkey => format!(
            "function fact( n ) {{
  if ( n <= 1 ) {{ return 1; }}
  return ( n * fact( n - 1 ) );
}}
return fact({n});
"
        ),
    }
}

pub fn fixture_for(engine: EngineId, n: u32) -> Fixture {
    Fixture {
        engine_id: engine,
        n,
        source: source_for(engine, n),
        expected: expected_value(engine.numeric(), n),
    }
}

/// One fixture per engine, in [`EngineId::ALL`] order.
pub fn catalog(n: u32) -> Vec<Fixture> {
    EngineId::ALL.iter().map(|e| fixture_for(*e, n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_values_at_12() {
        for f in catalog(12) {
            match f.engine_id.numeric() {
                Numeric::Exact => assert_eq!(f.expected, "479001600", "{}", f.engine_id),
                Numeric::Float => assert_eq!(f.expected, "479001600.000000", "{}", f.engine_id),
            }
        }
    }

    #[test]
    fn test_float_expected_at_100_is_the_f64_product() {
        let f = fixture_for(EngineId::Forth, 100);
        assert!(f.expected.starts_with("93326215443944"));
        assert!(f.expected.ends_with("813248.000000"));
        assert_ne!(f.expected.trim_end_matches(".000000"), baseline::exact_decimal(100));
    }

    #[test]
    fn test_sources_embed_n() {
        assert!(source_for(EngineId::Basic, 7).contains("20 LET N = 7"));
        assert!(source_for(EngineId::Tcl, 7).ends_with("fact 7\n"));
        assert!(source_for(EngineId::Lisp, 7).contains("(fact 7)"));
        assert!(source_for(EngineId::Forth, 7).contains("7 factorial"));
        assert!(source_for(EngineId::Monkey, 7).contains("return fact(7);"));
        assert_eq!(source_for(EngineId::Native, 7), "7");
    }

    #[test]
    fn test_catalog_covers_every_engine_once() {
        let ids: Vec<_> = catalog(5).into_iter().map(|f| f.engine_id).collect();
        assert_eq!(ids, EngineId::ALL.to_vec());
    }
}
