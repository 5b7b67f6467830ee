//! Lifecycle state snapshots and processing metrics

use crate::config::ProcessingStrategy;
use crate::error::ProcessingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of one submission.
///
/// `Pending → Processing → {Completed | Error | Cancelled}`. Terminal states
/// stay visible for a grace window before the entry is purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl ProcessingStatus {
    /// Stable string form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether this status ends the state machine.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one submission's lifecycle.
///
/// Pure data: the cancellation handle for the run lives in the
/// orchestrator's internal tracking entry, so snapshots serialize cleanly
/// for host UIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingState {
    /// Content fingerprint keying this submission
    pub file_key: String,

    /// Original file name
    pub file_name: String,

    /// Current lifecycle status
    pub status: ProcessingStatus,

    /// Progress percentage, monotonic while processing
    pub progress: f32,

    /// Strategy the run executes
    pub strategy: ProcessingStrategy,

    /// Last classified failure, when one occurred
    pub error: Option<ProcessingError>,

    /// When the submission was accepted
    pub started_at: DateTime<Utc>,

    /// When a terminal status was reached
    pub completed_at: Option<DateTime<Utc>>,

    /// Remaining time estimate in milliseconds
    pub estimated_time_remaining_ms: u64,

    /// Page currently being rendered
    pub current_page: Option<u32>,
}

impl ProcessingState {
    /// Initial state for a freshly accepted submission.
    #[must_use]
    pub fn pending(
        file_key: impl Into<String>,
        file_name: impl Into<String>,
        strategy: ProcessingStrategy,
        started_at: DateTime<Utc>,
        estimated_time_ms: u64,
    ) -> Self {
        Self {
            file_key: file_key.into(),
            file_name: file_name.into(),
            status: ProcessingStatus::Pending,
            progress: 0.0,
            strategy,
            error: None,
            started_at,
            completed_at: None,
            estimated_time_remaining_ms: estimated_time_ms,
            current_page: None,
        }
    }
}

/// Process-wide processing metrics.
///
/// A single aggregate mutated by the orchestrator on each lifecycle event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    /// Submissions that started an executor
    pub total_files: u64,

    /// Runs that reached `Completed`
    pub completed_files: u64,

    /// Runs that reached `Error`
    pub failed_files: u64,

    /// Running mean of successful run durations
    pub average_processing_time_ms: f64,

    /// Fraction of submissions served from cache
    pub cache_hit_rate: f64,

    /// Resident memory of the host process, refreshed on read
    pub memory_usage_bytes: u64,
}

impl ProcessingMetrics {
    /// Record an executor spawn.
    pub fn record_started(&mut self) {
        self.total_files += 1;
    }

    /// Record a successful run and fold its duration into the running mean.
    pub fn record_completed(&mut self, elapsed_ms: u64) {
        self.completed_files += 1;
        let completed = self.completed_files as f64;
        self.average_processing_time_ms =
            (self.average_processing_time_ms * (completed - 1.0) + elapsed_ms as f64) / completed;
    }

    /// Record a run that ended in `Error`.
    ///
    /// Cancellation is a deliberate abort, not a fault, and is not counted.
    pub fn record_failed(&mut self) {
        self.failed_files += 1;
    }

    /// Record a submission served from cache.
    pub fn record_cache_hit(&mut self) {
        let attempts = (self.total_files + 1) as f64;
        self.cache_hit_rate = (self.cache_hit_rate * self.total_files as f64 + 1.0) / attempts;
    }
}
