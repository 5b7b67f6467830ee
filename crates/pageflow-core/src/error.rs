//! Error taxonomy for processing operations
//!
//! Two layers: [`EngineError`] is what the embedded document engine and
//! renderer report at the capability boundary, with structured codes for the
//! conditions the pipeline must tell apart (encryption, corruption, memory
//! pressure). [`ProcessingError`] is the classified, retry-annotated value
//! the orchestrator surfaces to hosts.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Closed classification of processing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Parsing,
    Memory,
    Corruption,
    Timeout,
    Cancelled,
}

impl ErrorKind {
    /// Stable string form used in logs and state snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Memory => "memory",
            Self::Corruption => "corruption",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by the document engine or page renderer.
///
/// `open` implementations must use the structured variants for conditions
/// the pipeline branches on: `Encrypted` for password-protected documents,
/// `Corrupted` for unparseable ones, `OutOfMemory` for allocation failure.
/// The free-text variants (`Render`, `Io`, `Other`) fall back to keyword
/// classification.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("document requires a password")]
    Encrypted,

    #[error("corrupted document: {0}")]
    Corrupted(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    #[error("operation cancelled")]
    Cancelled,

    #[error("render failed: {0}")]
    Render(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A classified processing failure.
///
/// Immutable value produced by the retry layer: carries the taxonomy kind,
/// a human-readable message, whether another attempt is worthwhile, the
/// retry bookkeeping, and the originating engine error for diagnostics.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProcessingError {
    /// Taxonomy kind
    pub kind: ErrorKind,

    /// Human-readable description
    pub message: String,

    /// Whether a further attempt may succeed
    pub recoverable: bool,

    /// Zero-based attempt index that produced this failure
    pub retry_count: u32,

    /// Retry budget the run was configured with
    pub max_retries: u32,

    /// Originating engine error, when one exists
    #[serde(skip)]
    #[source]
    pub cause: Option<Arc<EngineError>>,
}

impl ProcessingError {
    /// Create an error with no retry context.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable: false,
            retry_count: 0,
            max_retries: 0,
            cause: None,
        }
    }

    /// Attach the originating engine error.
    #[must_use]
    pub fn with_cause(mut self, cause: Arc<EngineError>) -> Self {
        self.cause = Some(cause);
        self
    }
}

/// Result alias for operations that fail with a [`ProcessingError`].
pub type Result<T> = std::result::Result<T, ProcessingError>;
