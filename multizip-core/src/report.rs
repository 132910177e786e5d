use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::writer::WriteOutcome;

/// Summary of a finished archive, printed by the CLI with `--json`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ArchiveReport {
    pub created_utc: String,
    pub destination: String,
    pub roots: usize,
    pub entries: usize,
    pub bytes_in: u64,
    pub archive_bytes: u64,
    pub elapsed_ms: u64,
}

impl ArchiveReport {
    pub fn new(
        destination: &Path,
        roots: usize,
        written: &WriteOutcome,
        elapsed: Duration,
    ) -> Self {
        Self {
            created_utc: chrono::Utc::now().to_rfc3339(),
            destination: destination.to_string_lossy().to_string(),
            roots,
            entries: written.entries_written,
            bytes_in: written.bytes_read,
            archive_bytes: written.archive_bytes,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}
