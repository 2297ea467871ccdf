//! Trial runner: drives one adapter through setup, warmup and timing.
//!
//! # Design
//!
//! A trial moves through `Setup -> Warmup -> Timing -> Teardown -> Reported`
//! exactly once, in order. Only `run` and `extract` are inside the eval clock,
//! unless a cold trial asks for setup to be included. Adapter errors never
//! escape: they end the trial and are recorded on the `TrialResult`.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span, warn};

use crate::adapter::{EngineAdapter, Lifecycle, TrialError};
use crate::core::{Caveat, RunConfig, TrialMode, TrialResult, TrialStatus};

/// How many iterations to run, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialPlan {
    pub iterations: u32,
    pub warmup: u32,
    pub mode: TrialMode,
    /// Cold trials only: count construction time as eval time.
    pub include_setup: bool,
}

impl TrialPlan {
    pub fn new(iterations: u32) -> Self {
        TrialPlan { iterations, warmup: 0, mode: TrialMode::Warm, include_setup: false }
    }

    pub fn with_warmup(mut self, warmup: u32) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_mode(mut self, mode: TrialMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_setup_included(mut self) -> Self {
        self.include_setup = true;
        self
    }
}

impl From<&RunConfig> for TrialPlan {
    fn from(c: &RunConfig) -> Self {
        TrialPlan {
            iterations: c.measured_iterations,
            warmup: c.warmup_iterations,
            mode: c.mode,
            include_setup: c.include_setup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrialState {
    Setup,
    Warmup,
    Timing,
    Teardown,
    Reported,
}

struct StateTracker<'a> {
    engine: &'a str,
    state: TrialState,
}

impl<'a> StateTracker<'a> {
    fn new(engine: &'a str) -> Self {
        debug!(engine, state = ?TrialState::Setup, "trial state");
        StateTracker { engine, state: TrialState::Setup }
    }

    fn advance(&mut self, next: TrialState) {
        debug_assert!(next > self.state, "trial state went from {:?} to {next:?}", self.state);
        debug!(engine = self.engine, from = ?self.state, to = ?next, "trial state");
        self.state = next;
    }
}

/// Running totals for the timing phase.
#[derive(Default)]
struct Tally {
    iterations: u32,
    setup: Duration,
    eval: Duration,
    last_value: Option<String>,
    failure: Option<TrialError>,
}

fn once<A: EngineAdapter + ?Sized>(adapter: &A, handle: &mut A::Handle) -> Result<String, TrialError> {
    let raw = adapter.run(handle)?;
    adapter.extract(raw)
}

/// Run one trial of `source` on `adapter`. Verification is left to the caller.
pub fn run_trial<A: EngineAdapter + ?Sized>(adapter: &A, source: &str, n: u32, plan: &TrialPlan) -> TrialResult {
    let engine_id = EngineAdapter::engine_id(adapter).to_string();
    let mode = match adapter.lifecycle() {
        Lifecycle::ColdOnly => TrialMode::Cold,
        Lifecycle::Warm => plan.mode,
    };
    let span = info_span!("trial", engine = %engine_id, n, mode = mode.as_str());
    let _guard = span.enter();
    if mode != plan.mode {
        debug!("engine cannot be reused, running cold");
    }

    let mut tracker = StateTracker::new(&engine_id);
    let outcome = match mode {
        TrialMode::Warm => run_warm(adapter, source, plan, &mut tracker),
        TrialMode::Cold => run_cold(adapter, source, plan, &mut tracker),
    };
    let tally = match outcome {
        Ok(tally) => tally,
        Err(e) => {
            error!(error = %e, "engine failed to initialise");
            tracker.advance(TrialState::Reported);
            return TrialResult::init_failed(&engine_id, n, mode, plan.iterations, e.to_string());
        }
    };

    let mut caveats = adapter.caveats();
    if mode == TrialMode::Cold {
        caveats.push(Caveat::SetupPerIteration);
        if plan.include_setup {
            caveats.push(Caveat::SetupInEvalClock);
        }
    }

    let incomplete = tally.failure.is_some();
    if let Some(e) = &tally.failure {
        warn!(error = %e, completed = tally.iterations, requested = plan.iterations, "trial stopped early");
    }
    info!(
        iterations = tally.iterations,
        setup_ns = tally.setup.as_nanos() as u64,
        eval_ns = tally.eval.as_nanos() as u64,
        "trial finished"
    );
    tracker.advance(TrialState::Reported);

    TrialResult {
        engine_id,
        n,
        mode,
        requested_iterations: plan.iterations,
        iterations: tally.iterations,
        total_setup_time: tally.setup,
        setup_per_iteration: mode == TrialMode::Cold,
        total_eval_time: tally.eval,
        final_value: tally.last_value,
        matched_expected: false,
        incomplete,
        status: if incomplete { TrialStatus::Incomplete } else { TrialStatus::Ok },
        error: tally.failure.map(|e| e.to_string()),
        caveats,
    }
}

/// One handle built outside the clock, evaluated `iterations` times.
fn run_warm<A: EngineAdapter + ?Sized>(
    adapter: &A,
    source: &str,
    plan: &TrialPlan,
    tracker: &mut StateTracker<'_>,
) -> Result<Tally, TrialError> {
    let mut tally = Tally::default();
    let start = Instant::now();
    let mut handle = adapter.init(source)?;
    tally.setup = start.elapsed();

    if plan.warmup > 0 {
        tracker.advance(TrialState::Warmup);
        for _ in 0..plan.warmup {
            if let Err(e) = once(adapter, &mut handle) {
                tally.failure = Some(e);
                break;
            }
        }
    }

    tracker.advance(TrialState::Timing);
    if tally.failure.is_none() {
        for _ in 0..plan.iterations {
            let start = Instant::now();
            let result = once(adapter, &mut handle);
            let elapsed = start.elapsed();
            match result {
                Ok(value) => {
                    tally.eval += elapsed;
                    tally.iterations += 1;
                    tally.last_value = Some(value);
                }
                Err(e) => {
                    tally.failure = Some(e);
                    break;
                }
            }
        }
    }

    tracker.advance(TrialState::Teardown);
    drop(handle);
    Ok(tally)
}

/// A fresh handle per iteration. The first handle doubles as the check that
/// the source initialises at all.
fn run_cold<A: EngineAdapter + ?Sized>(
    adapter: &A,
    source: &str,
    plan: &TrialPlan,
    tracker: &mut StateTracker<'_>,
) -> Result<Tally, TrialError> {
    let mut tally = Tally::default();
    let start = Instant::now();
    let first = adapter.init(source)?;
    let mut first = Some((first, start.elapsed()));

    if plan.warmup > 0 {
        tracker.advance(TrialState::Warmup);
        for _ in 0..plan.warmup {
            let result = adapter.init(source).and_then(|mut h| once(adapter, &mut h));
            if let Err(e) = result {
                tally.failure = Some(e);
                break;
            }
        }
    }

    tracker.advance(TrialState::Timing);
    if tally.failure.is_none() {
        for _ in 0..plan.iterations {
            let (mut handle, setup) = match first.take() {
                Some(built) => built,
                None => {
                    let start = Instant::now();
                    match adapter.init(source) {
                        Ok(h) => (h, start.elapsed()),
                        Err(e) => {
                            tally.failure = Some(e);
                            break;
                        }
                    }
                }
            };
            tally.setup += setup;

            let start = Instant::now();
            let result = once(adapter, &mut handle);
            let elapsed = start.elapsed();
            drop(handle);
            match result {
                Ok(value) => {
                    tally.eval += if plan.include_setup { elapsed + setup } else { elapsed };
                    tally.iterations += 1;
                    tally.last_value = Some(value);
                }
                Err(e) => {
                    tally.failure = Some(e);
                    break;
                }
            }
        }
    }

    tracker.advance(TrialState::Teardown);
    Ok(tally)
}
