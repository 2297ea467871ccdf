//! Record types shared by the runner, storage and reporting.

pub mod env;
pub mod schema;

pub use env::EnvironmentInfo;
pub use schema::{Caveat, RunConfig, SCHEMA_VERSION, TrialMode, TrialRecord, TrialResult, TrialStatus};
