//! Adapter contract between the trial runner and an engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Caveat, TrialResult};
use crate::fixtures::Fixture;
use crate::harness::runner::{self, TrialPlan};
use crate::harness::verify;

/// A failure in one phase of a trial.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "phase", content = "message", rename_all = "snake_case")]
pub enum TrialError {
    #[error("init failed: {0}")]
    Init(String),
    #[error("eval failed: {0}")]
    Eval(String),
    #[error("extract failed: {0}")]
    Extract(String),
}

impl TrialError {
    pub fn init(e: impl std::fmt::Display) -> Self {
        TrialError::Init(e.to_string())
    }

    pub fn eval(e: impl std::fmt::Display) -> Self {
        TrialError::Eval(e.to_string())
    }

    pub fn extract(e: impl std::fmt::Display) -> Self {
        TrialError::Extract(e.to_string())
    }
}

/// Whether an engine instance can be evaluated more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Warm,
    /// Needs a fresh instance per evaluation.
    ColdOnly,
}

/// One interpreter engine seen through the three-phase trial protocol.
///
/// `init` runs outside the eval clock in warm mode. `run` and `extract`
/// are always timed.
pub trait EngineAdapter {
    /// Everything a trial needs to evaluate again: the engine plus any state it
    /// keeps outside itself.
    type Handle;
    /// Whatever `run` produces before it is rendered as a string.
    type Raw;

    fn engine_id(&self) -> &str;

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Warm
    }

    /// Caveats that apply to every trial of this engine.
    fn caveats(&self) -> Vec<Caveat> {
        Vec::new()
    }

    fn init(&self, source: &str) -> Result<Self::Handle, TrialError>;

    fn run(&self, handle: &mut Self::Handle) -> Result<Self::Raw, TrialError>;

    fn extract(&self, raw: Self::Raw) -> Result<String, TrialError>;
}

/// Object-safe view of an adapter, so engines with different handle types
/// can share one registry.
pub trait Benchmark {
    fn engine_id(&self) -> &str;

    fn lifecycle(&self) -> Lifecycle;

    fn caveats(&self) -> Vec<Caveat>;

    /// Run `fixture` under `plan` and verify the final value.
    fn run_trial(&self, fixture: &Fixture, plan: &TrialPlan) -> TrialResult;
}

impl<A: EngineAdapter> Benchmark for A {
    fn engine_id(&self) -> &str {
        EngineAdapter::engine_id(self)
    }

    fn lifecycle(&self) -> Lifecycle {
        EngineAdapter::lifecycle(self)
    }

    fn caveats(&self) -> Vec<Caveat> {
        EngineAdapter::caveats(self)
    }

    fn run_trial(&self, fixture: &Fixture, plan: &TrialPlan) -> TrialResult {
        let mut result = runner::run_trial(self, &fixture.source, fixture.n, plan);
        verify::apply(&mut result, &fixture.expected);
        result
    }
}
