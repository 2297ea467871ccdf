use std::io::Write;
use std::path::PathBuf;

use tracing::info;

use crate::BenchResult;
use crate::adapter::benchmark_for;
use crate::config::{CliOverrides, load_config, resolve};
use crate::core::{EnvironmentInfo, TrialRecord, TrialResult, TrialStatus};
use crate::harness::TrialPlan;
use crate::report::{OutputFormat, json_line, text_table};
use crate::storage::{CsvExporter, JsonlWriter};

#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub overrides: CliOverrides,
    pub format: OutputFormat,
    pub config: Option<PathBuf>,
    pub jsonl: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: Vec<TrialResult>,
    pub records: Vec<TrialRecord>,
}

impl RunOutcome {
    /// 1 when any engine failed to initialise. Mismatches and incomplete
    /// trials do not fail the run.
    pub fn exit_code(&self) -> i32 {
        if self.results.iter().any(|r| r.status == TrialStatus::InitFailed) { 1 } else { 0 }
    }
}

/// Run every selected engine and print to stdout; returns the process exit code.
pub fn run(args: &RunArgs) -> BenchResult<i32> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    Ok(execute(args, &mut out)?.exit_code())
}

/// Engines run one after another, each line written as its trial finishes.
pub fn execute<W: Write>(args: &RunArgs, out: &mut W) -> BenchResult<RunOutcome> {
    let file = args.config.as_deref().map(load_config).transpose()?;
    let resolved = resolve(file.as_ref(), &args.overrides)?;
    let plan = TrialPlan::from(&resolved.config);
    let env = if args.jsonl.is_some() || args.csv.is_some() {
        EnvironmentInfo::detect()
    } else {
        EnvironmentInfo::default()
    };

    info!(
        engines = resolved.fixtures.len(),
        iterations = plan.iterations,
        warmup = plan.warmup,
        n = resolved.config.n,
        mode = resolved.config.mode.as_str(),
        "starting run"
    );

    let mut results = Vec::with_capacity(resolved.fixtures.len());
    let mut records = Vec::with_capacity(resolved.fixtures.len());
    for fixture in &resolved.fixtures {
        let result = benchmark_for(fixture.engine_id).run_trial(fixture, &plan);
        if args.format == OutputFormat::Json {
            writeln!(out, "{}", json_line(&result)?)?;
            out.flush()?;
        }
        records.push(TrialRecord::new(&fixture.source, env.clone(), resolved.config.clone(), result.clone()));
        results.push(result);
    }
    if args.format == OutputFormat::Text {
        write!(out, "{}", text_table(&results))?;
    }

    if let Some(path) = &args.jsonl {
        let writer = JsonlWriter::new(path);
        if !writer.exists() {
            info!(path = %path.display(), "creating jsonl store");
        }
        writer.append_all(&records)?;
        info!(path = %path.display(), records = records.len(), "appended records");
    }
    if let Some(path) = &args.csv {
        CsvExporter::new().export(&records, path)?;
        info!(path = %path.display(), "wrote csv");
    }

    Ok(RunOutcome { results, records })
}
