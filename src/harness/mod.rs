//! Trial protocol: timing, lifecycle handling and result verification.

pub mod runner;
pub mod verify;

pub use runner::{TrialPlan, TrialState, run_trial};
pub use verify::{Verification, verify};
