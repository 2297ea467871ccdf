//! Run configuration: TOML file plus command-line overrides.
//!
//! ```toml
//! [harness]
//! iterations = 1000
//! warmup = 10
//! n = 12
//! mode = "warm"
//! engines = ["native", "tcl"]
//!
//! [[fixture]]
//! engine = "tcl"
//! path = "fact.tcl"        # or: source = "..."
//! expected = "479001600"   # optional
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::adapter::EngineId;
use crate::core::{RunConfig, TrialMode};
use crate::fixtures::{self, DEFAULT_N, Fixture, MAX_N};
use crate::{BenchError, BenchResult};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessSection {
    pub iterations: Option<u32>,
    pub warmup: Option<u32>,
    pub n: Option<u32>,
    pub mode: Option<TrialMode>,
    pub include_setup: Option<bool>,
    pub engines: Option<Vec<String>>,
}

/// Replaces the built-in program (and optionally the expected value) for one engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureOverride {
    pub engine: String,
    pub source: Option<String>,
    /// Relative paths resolve against the config file's directory.
    pub path: Option<PathBuf>,
    pub expected: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub harness: HarnessSection,
    #[serde(default, rename = "fixture")]
    pub fixtures: Vec<FixtureOverride>,
    /// Directory of the file this was loaded from.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> BenchResult<FileConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| BenchError::Message(format!("failed to read {}: {e}", path.display())))?;
    let mut cfg: FileConfig = toml::from_str(&s)?;
    cfg.base_dir = path.parent().map(Path::to_path_buf);
    Ok(cfg)
}

/// Values given on the command line; `None` means not given.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub iterations: Option<u32>,
    pub warmup: Option<u32>,
    pub n: Option<u32>,
    pub mode: Option<TrialMode>,
    pub include_setup: bool,
    pub engines: Vec<String>,
}

/// Everything a run needs once file and flags are merged.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub config: RunConfig,
    /// One per selected engine, in [`EngineId::ALL`] order.
    pub fixtures: Vec<Fixture>,
}

/// Merge `file` and `cli`, command line first, then file, then defaults.
pub fn resolve(file: Option<&FileConfig>, cli: &CliOverrides) -> BenchResult<ResolvedRun> {
    let default_section = HarnessSection::default();
    let h = file.map(|f| &f.harness).unwrap_or(&default_section);
    let defaults = RunConfig::default();

    let config = RunConfig {
        measured_iterations: cli.iterations.or(h.iterations).unwrap_or(defaults.measured_iterations),
        warmup_iterations: cli.warmup.or(h.warmup).unwrap_or(defaults.warmup_iterations),
        n: cli.n.or(h.n).unwrap_or(DEFAULT_N),
        mode: cli.mode.or(h.mode).unwrap_or(defaults.mode),
        include_setup: cli.include_setup || h.include_setup.unwrap_or(false),
    };
    if config.measured_iterations == 0 {
        return Err(BenchError::Message("iterations must be at least 1".into()));
    }
    check_n(config.n)?;

    let names: &[String] = if !cli.engines.is_empty() {
        &cli.engines
    } else {
        h.engines.as_deref().unwrap_or_default()
    };
    let selected = parse_engines(names)?;

    let mut fixtures: Vec<Fixture> = selected.iter().map(|&id| fixtures::fixture_for(id, config.n)).collect();

    if let Some(file) = file {
        for o in &file.fixtures {
            apply_override(&mut fixtures, o, file.base_dir.as_deref())?;
        }
    }

    Ok(ResolvedRun { config, fixtures })
}

/// Reject an N above [`MAX_N`].
pub fn check_n(n: u32) -> BenchResult<()> {
    if n > MAX_N {
        return Err(BenchError::Message(format!("n must be at most {MAX_N}, got {n}")));
    }
    Ok(())
}

/// Engine names to ids; empty means every engine.
pub fn parse_engines(names: &[String]) -> BenchResult<Vec<EngineId>> {
    if names.is_empty() {
        return Ok(EngineId::ALL.to_vec());
    }
    let mut ids = names.iter().map(|n| n.parse()).collect::<BenchResult<Vec<EngineId>>>()?;
    ids.sort();
    ids.dedup();
    Ok(ids)
}

fn apply_override(fixtures: &mut [Fixture], o: &FixtureOverride, base_dir: Option<&Path>) -> BenchResult<()> {
    let engine: EngineId = o.engine.parse()?;
    // Overrides for engines that are not selected are ignored.
    let Some(fixture) = fixtures.iter_mut().find(|f| f.engine_id == engine) else {
        return Ok(());
    };
    let source = match (&o.source, &o.path) {
        (Some(_), Some(_)) => {
            return Err(BenchError::Message(format!(
                "fixture for `{engine}` sets both `source` and `path`"
            )));
        }
        (Some(s), None) => Some(s.clone()),
        (None, Some(p)) => {
            let full = match base_dir {
                Some(dir) if p.is_relative() => dir.join(p),
                _ => p.clone(),
            };
            let text = std::fs::read_to_string(&full)
                .map_err(|e| BenchError::Message(format!("failed to read {}: {e}", full.display())))?;
            Some(text)
        }
        (None, None) => None,
    };
    if let Some(source) = source {
        fixture.source = source;
    }
    if let Some(expected) = &o.expected {
        fixture.expected = expected.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> FileConfig {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_defaults_without_file() {
        let run = resolve(None, &CliOverrides::default()).unwrap();
        assert_eq!(run.config, RunConfig::default());
        assert_eq!(run.fixtures.len(), EngineId::ALL.len());
    }

    #[test]
    fn test_cli_wins_over_file() {
        let file = parse("[harness]\niterations = 50\nn = 10\nmode = \"cold\"\n");
        let cli = CliOverrides { iterations: Some(5), ..Default::default() };
        let run = resolve(Some(&file), &cli).unwrap();
        assert_eq!(run.config.measured_iterations, 5);
        assert_eq!(run.config.n, 10);
        assert_eq!(run.config.mode, TrialMode::Cold);
        assert!(run.fixtures.iter().all(|f| f.n == 10));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let cli = CliOverrides { iterations: Some(0), ..Default::default() };
        assert!(resolve(None, &cli).is_err());
    }

    #[test]
    fn test_n_above_bound_rejected() {
        let cli = CliOverrides { n: Some(200_000), ..Default::default() };
        let err = resolve(None, &cli).unwrap_err();
        assert!(err.to_string().contains("at most 10000"), "{err}");

        let file = parse("[harness]\nn = 10001\n");
        assert!(resolve(Some(&file), &CliOverrides::default()).is_err());
        assert!(check_n(MAX_N).is_ok());
    }

    #[test]
    fn test_engine_filter_keeps_report_order() {
        let cli = CliOverrides {
            engines: vec!["monkey".into(), "native".into(), "monkey".into()],
            ..Default::default()
        };
        let run = resolve(None, &cli).unwrap();
        let ids: Vec<_> = run.fixtures.iter().map(|f| f.engine_id).collect();
        assert_eq!(ids, vec![EngineId::Native, EngineId::Monkey]);
    }

    #[test]
    fn test_unknown_engine_is_an_error() {
        let file = parse("[harness]\nengines = [\"cobol\"]\n");
        let err = resolve(Some(&file), &CliOverrides::default()).unwrap_err();
        assert!(matches!(err, BenchError::UnknownEngine(ref e) if e == "cobol"));
    }

    #[test]
    fn test_inline_source_override() {
        let file = parse("[[fixture]]\nengine = \"lisp\"\nsource = \"(+ 1 2)\"\nexpected = \"3\"\n");
        let run = resolve(Some(&file), &CliOverrides::default()).unwrap();
        let lisp = run.fixtures.iter().find(|f| f.engine_id == EngineId::Lisp).unwrap();
        assert_eq!(lisp.source, "(+ 1 2)");
        assert_eq!(lisp.expected, "3");
    }

    #[test]
    fn test_source_and_path_together_rejected() {
        let file = parse("[[fixture]]\nengine = \"tcl\"\nsource = \"x\"\npath = \"y.tcl\"\n");
        assert!(resolve(Some(&file), &CliOverrides::default()).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<FileConfig>("[harness]\niteratons = 3\n").is_err());
    }
}
