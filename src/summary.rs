//! End-of-run counts and the exit code derived from them.

use crate::executor::{OperationResult, OperationStatus};
use crate::undo::{UndoResult, UndoStatus};

/// Exit code for errors that stop a run before or instead of processing
/// entries: missing source, unreadable or corrupt manifest, bad config.
pub const FATAL_EXIT_CODE: u8 = 2;

/// Exit code when at least one entry was not fully successful.
pub const PARTIAL_EXIT_CODE: u8 = 1;

/// Counts of results by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Files moved, or restored to their original path.
    pub succeeded: usize,
    pub failed: usize,
    /// Undo entries whose recorded file was gone.
    pub stale: usize,
    /// Undo entries restored beside an occupied original path.
    pub conflicts: usize,
    /// Dry-run entries.
    pub previewed: usize,
}

impl RunSummary {
    pub fn from_operations(results: &[OperationResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record_operation(result);
        }
        summary
    }

    pub fn from_undo(results: &[UndoResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record_undo(result);
        }
        summary
    }

    pub fn record_operation(&mut self, result: &OperationResult) {
        match result.status {
            OperationStatus::Moved { .. } => self.succeeded += 1,
            OperationStatus::Previewed { .. } => self.previewed += 1,
            OperationStatus::Failed { .. } => self.failed += 1,
        }
    }

    pub fn record_undo(&mut self, result: &UndoResult) {
        match result.status {
            UndoStatus::Restored { .. } => self.succeeded += 1,
            UndoStatus::Conflict { .. } => self.conflicts += 1,
            UndoStatus::Stale => self.stale += 1,
            UndoStatus::Previewed { .. } => self.previewed += 1,
            UndoStatus::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.stale + self.conflicts + self.previewed
    }

    /// True when every entry went exactly as intended.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.stale == 0 && self.conflicts == 0
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            PARTIAL_EXIT_CODE
        }
    }
}
