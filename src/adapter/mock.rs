//! Scriptable adapter for exercising the trial runner.

use std::cell::Cell;
use std::time::Duration;

use crate::core::Caveat;

use super::traits::{EngineAdapter, Lifecycle, TrialError};

/// Configuration for mock adapter responses.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Engine id to report
    pub name: String,
    /// Value every successful run produces
    pub value: String,
    pub lifecycle: Lifecycle,
    pub caveats: Vec<Caveat>,
    /// Whether init should fail
    pub init_fails: bool,
    /// 1-based `run` call that fails, counting warmup calls
    pub fail_on_run: Option<u32>,
    /// Whether extract should fail
    pub extract_fails: bool,
    /// Time each run spends sleeping
    pub run_delay: Duration,
}

impl MockConfig {
    pub fn new(name: impl Into<String>) -> Self {
        MockConfig {
            name: name.into(),
            value: "479001600".to_string(),
            lifecycle: Lifecycle::Warm,
            caveats: Vec::new(),
            init_fails: false,
            fail_on_run: None,
            extract_fails: false,
            run_delay: Duration::ZERO,
        }
    }

    pub fn cold_only(mut self) -> Self {
        self.lifecycle = Lifecycle::ColdOnly;
        self
    }

    pub fn with_caveat(mut self, caveat: Caveat) -> Self {
        self.caveats.push(caveat);
        self
    }

    pub fn init_fails(mut self) -> Self {
        self.init_fails = true;
        self
    }

    pub fn fail_on_run(mut self, call: u32) -> Self {
        self.fail_on_run = Some(call);
        self
    }

    pub fn extract_fails(mut self) -> Self {
        self.extract_fails = true;
        self
    }

    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }
}

/// Adapter that returns configured results and counts the calls it sees.
pub struct MockAdapter {
    config: MockConfig,
    init_calls: Cell<u32>,
    run_calls: Cell<u32>,
}

impl MockAdapter {
    pub fn new(config: MockConfig) -> Self {
        MockAdapter { config, init_calls: Cell::new(0), run_calls: Cell::new(0) }
    }

    pub fn default_mock() -> Self {
        Self::new(MockConfig::new("mock"))
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls.get()
    }

    pub fn run_calls(&self) -> u32 {
        self.run_calls.get()
    }
}

impl EngineAdapter for MockAdapter {
    /// Source text handed to `init`.
    type Handle = String;
    type Raw = String;

    fn engine_id(&self) -> &str {
        &self.config.name
    }

    fn lifecycle(&self) -> Lifecycle {
        self.config.lifecycle
    }

    fn caveats(&self) -> Vec<Caveat> {
        self.config.caveats.clone()
    }

    fn init(&self, source: &str) -> Result<String, TrialError> {
        self.init_calls.set(self.init_calls.get() + 1);
        if self.config.init_fails {
            return Err(TrialError::Init("mock init failed".into()));
        }
        Ok(source.to_string())
    }

    fn run(&self, _handle: &mut String) -> Result<String, TrialError> {
        let call = self.run_calls.get() + 1;
        self.run_calls.set(call);
        if !self.config.run_delay.is_zero() {
            std::thread::sleep(self.config.run_delay);
        }
        if self.config.fail_on_run == Some(call) {
            return Err(TrialError::Eval(format!("mock run {call} failed")));
        }
        Ok(self.config.value.clone())
    }

    fn extract(&self, raw: String) -> Result<String, TrialError> {
        if self.config.extract_fails {
            return Err(TrialError::Extract("mock extract failed".into()));
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_counts_calls() {
        let mock = MockAdapter::default_mock();
        let mut h = mock.init("src").unwrap();
        assert_eq!(mock.run(&mut h).unwrap(), "479001600");
        assert_eq!(mock.run(&mut h).unwrap(), "479001600");
        assert_eq!(mock.init_calls(), 1);
        assert_eq!(mock.run_calls(), 2);
    }

    #[test]
    fn test_mock_fails_on_requested_call() {
        let mock = MockAdapter::new(MockConfig::new("m").fail_on_run(2));
        let mut h = mock.init("").unwrap();
        assert!(mock.run(&mut h).is_ok());
        assert!(matches!(mock.run(&mut h), Err(TrialError::Eval(_))));
        assert!(mock.run(&mut h).is_ok());
    }
}
