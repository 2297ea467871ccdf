//! CSV export for trial records.

use std::io::Write;
use std::path::Path;

use crate::BenchError;
use crate::core::schema::TrialRecord;

/// CSV column headers in deterministic order.
pub const CSV_HEADERS: &[&str] = &[
    "schema_version",
    "record_id",
    "timestamp",
    "engine_id",
    "n",
    "mode",
    "status",
    "warmup",
    "requested_iterations",
    "iterations",
    "setup_time_ns",
    "eval_time_ns",
    "mean_eval_ns",
    "throughput_per_sec",
    "final_value",
    "matched_expected",
    "incomplete",
    "caveats",
    "error",
    "source_sha256",
    "git_sha",
    "cpu_model",
];

/// Flattens trial records into one CSV row each.
#[derive(Debug, Clone, Default)]
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        CsvExporter
    }

    /// Export records to a CSV file, creating parent directories.
    pub fn export(&self, records: &[TrialRecord], output: &Path) -> Result<(), BenchError> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BenchError::Message(format!("failed to create directory: {e}")))?;
            }
        }

        let file = std::fs::File::create(output)
            .map_err(|e| BenchError::Message(format!("failed to create file: {e}")))?;

        self.export_to_writer(records, file)
    }

    pub fn export_to_writer<W: Write>(&self, records: &[TrialRecord], writer: W) -> Result<(), BenchError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(CSV_HEADERS)?;
        for record in records {
            csv_writer.write_record(self.record_to_row(record))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    fn record_to_row(&self, record: &TrialRecord) -> Vec<String> {
        let r = &record.result;
        vec![
            record.schema_version.to_string(),
            record.record_id.clone(),
            record.timestamp.clone(),
            record.engine_id.clone(),
            r.n.to_string(),
            r.mode.as_str().to_string(),
            r.status.as_str().to_string(),
            record.config.warmup_iterations.to_string(),
            r.requested_iterations.to_string(),
            r.iterations.to_string(),
            r.total_setup_time.as_nanos().to_string(),
            r.total_eval_time.as_nanos().to_string(),
            r.mean_eval_ns().map(|v| format!("{v:.1}")).unwrap_or_default(),
            r.throughput_per_sec().map(|v| format!("{v:.1}")).unwrap_or_default(),
            r.final_value.clone().unwrap_or_default(),
            r.matched_expected.to_string(),
            r.incomplete.to_string(),
            r.caveats.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(";"),
            r.error.clone().unwrap_or_default(),
            record.source_sha256.clone(),
            record.env.git_sha.clone().unwrap_or_default(),
            record.env.cpu_model.clone().unwrap_or_default(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::{Caveat, EnvironmentInfo, RunConfig, TrialMode, TrialResult, TrialStatus};

    fn make_test_record(engine: &str) -> TrialRecord {
        let result = TrialResult {
            engine_id: engine.to_string(),
            n: 12,
            mode: TrialMode::Cold,
            requested_iterations: 5,
            iterations: 5,
            total_setup_time: Duration::from_nanos(1_000),
            setup_per_iteration: true,
            total_eval_time: Duration::from_nanos(5_000),
            final_value: Some("479001600.000000".into()),
            matched_expected: true,
            incomplete: false,
            status: TrialStatus::Ok,
            error: None,
            caveats: vec![Caveat::ParseInsideRun, Caveat::SetupPerIteration],
        };
        TrialRecord::new("12 factorial", EnvironmentInfo::default(), RunConfig::default(), result)
    }

    #[test]
    fn test_record_to_row_length() {
        let row = CsvExporter::new().record_to_row(&make_test_record("forth"));
        assert_eq!(row.len(), CSV_HEADERS.len());
    }

    #[test]
    fn test_export_to_writer() {
        let mut buffer = Vec::new();
        CsvExporter::new()
            .export_to_writer(&[make_test_record("forth"), make_test_record("basic")], &mut buffer)
            .unwrap();

        let csv_str = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = csv_str.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("schema_version,record_id,timestamp,engine_id"));
        assert!(lines[1].contains(",forth,12,cold,ok,"));
        assert!(lines[1].contains(",1000,5000,1000.0,"));
        assert!(lines[1].contains("parse_inside_run;setup_per_iteration"));
    }

    #[test]
    fn test_optional_fields_default_to_empty() {
        let row = CsvExporter::new().record_to_row(&make_test_record("forth"));
        let idx = |name: &str| CSV_HEADERS.iter().position(|h| *h == name).unwrap();
        assert_eq!(row[idx("error")], "");
        assert_eq!(row[idx("git_sha")], "");
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("out/trials.csv");
        CsvExporter::new().export(&[make_test_record("forth")], &output_path).unwrap();
        let contents = std::fs::read_to_string(&output_path).unwrap();
        assert!(contents.contains("479001600.000000"));
    }
}
