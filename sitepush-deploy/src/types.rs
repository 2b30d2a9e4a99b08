//! Shared types for deploy runs.

use std::fmt;
use std::time::Duration;

/// Terminal classification of one enumerated file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferOutcome {
    /// Remote copy already matches.
    Skipped,
    /// Transferred within the retry budget.
    Uploaded,
    /// Retry budget exhausted, or the local file could not be read.
    Failed,
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Skipped => write!(f, "skipped"),
            TransferOutcome::Uploaded => write!(f, "uploaded"),
            TransferOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome for a single file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileResult {
    pub relative_path: String,
    pub size: u64,
    pub outcome: TransferOutcome,
    /// Upload attempts made (0 for skipped files).
    pub attempts: u32,
}

/// Counters and per-file results for one run.
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_uploaded: u64,
    pub sessions_opened: usize,
    pub results: Vec<FileResult>,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn record(&mut self, result: FileResult) {
        match result.outcome {
            TransferOutcome::Skipped => self.skipped += 1,
            TransferOutcome::Uploaded => {
                self.uploaded += 1;
                self.bytes_uploaded += result.size;
            }
            TransferOutcome::Failed => self.failed += 1,
        }
        self.results.push(result);
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Relative paths that ended with the given outcome, in run order.
    pub fn paths_with(&self, outcome: TransferOutcome) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.outcome == outcome)
            .map(|r| r.relative_path.as_str())
            .collect()
    }
}
