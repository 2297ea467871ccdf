use std::io::Write;

use crate::BenchResult;
use crate::adapter::{Lifecycle, Numeric, benchmark_for};
use crate::config::check_n;
use crate::fixtures::catalog;

/// Print the engine catalogue, optionally with each fixture's program for `n`.
pub fn run<W: Write>(out: &mut W, n: u32, show_source: bool) -> BenchResult<()> {
    check_n(n)?;
    for fixture in catalog(n) {
        let id = fixture.engine_id;
        let bench = benchmark_for(id);
        let lifecycle = match bench.lifecycle() {
            Lifecycle::Warm => "warm",
            Lifecycle::ColdOnly => "cold-only",
        };
        let numeric = match id.numeric() {
            Numeric::Exact => "exact",
            Numeric::Float => "f64",
        };
        let caveats: Vec<&str> = bench.caveats().iter().map(|c| c.as_str()).collect();
        writeln!(
            out,
            "{:<11} {:<9} {:<5} {}{}",
            id.as_str(),
            lifecycle,
            numeric,
            id.describe(),
            if caveats.is_empty() { String::new() } else { format!(" [{}]", caveats.join(", ")) }
        )?;
        if show_source {
            writeln!(out, "  expected {}! = {}", n, fixture.expected)?;
            for line in fixture.source.lines() {
                writeln!(out, "    {line}")?;
            }
        }
    }
    Ok(())
}
