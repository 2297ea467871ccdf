//! Rendering trial results for stdout.

pub mod lines;

pub use lines::{format_ns, json_line, relative_overhead, text_table};

/// Output format for `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per engine
    #[default]
    Json,
    /// Aligned table for humans
    Text,
}
