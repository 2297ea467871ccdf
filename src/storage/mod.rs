//! Persistence for `TrialRecord` data.

pub mod csv;
pub mod jsonl;

pub use csv::{CSV_HEADERS, CsvExporter};
pub use jsonl::JsonlWriter;
