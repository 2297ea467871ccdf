//! JSON Lines store for trial records.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::BenchError;
use crate::core::schema::{SCHEMA_VERSION, TrialRecord};

/// Appends trial records one JSON object per line and reads them back.
#[derive(Debug, Clone)]
pub struct JsonlWriter {
    path: PathBuf,
}

impl JsonlWriter {
    /// The file is created on first append.
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonlWriter { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The record's schema_version doesn't match SCHEMA_VERSION
    /// - File operations or serialization fail
    pub fn append(&self, record: &TrialRecord) -> Result<(), BenchError> {
        self.append_all(std::slice::from_ref(record))
    }

    /// Append several records with a single open of the file.
    pub fn append_all(&self, records: &[TrialRecord]) -> Result<(), BenchError> {
        if let Some(bad) = records.iter().find(|r| r.schema_version != SCHEMA_VERSION) {
            return Err(BenchError::Message(format!(
                "schema version mismatch: record has v{}, expected v{}",
                bad.schema_version, SCHEMA_VERSION
            )));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BenchError::Message(format!("failed to create directory: {e}")))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BenchError::Message(format!("failed to open file: {e}")))?;

        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(file, "{json}")?;
        }
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<TrialRecord>, BenchError> {
        self.read_filtered(None)
    }

    /// Read records, keeping only those for `engine_id` when given.
    ///
    /// # Errors
    /// Returns an error if the file is missing or any non-blank line fails to parse.
    pub fn read_filtered(&self, engine_id: Option<&str>) -> Result<Vec<TrialRecord>, BenchError> {
        if !self.path.exists() {
            return Err(BenchError::Message(format!("file not found: {}", self.path.display())));
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let record: TrialRecord = serde_json::from_str(&line).map_err(|e| {
                BenchError::Message(format!("failed to parse line {}: {e}", line_num + 1))
            })?;

            if engine_id.is_some_and(|id| record.engine_id != id) {
                continue;
            }
            records.push(record);
        }

        Ok(records)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Number of non-blank lines; 0 when the file does not exist.
    pub fn count(&self) -> Result<usize, BenchError> {
        if !self.path.exists() {
            return Ok(0);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(reader.lines().map_while(Result::ok).filter(|l| !l.trim().is_empty()).count())
    }
}
