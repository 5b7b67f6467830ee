//! Processing strategies, quality tiers, and configuration

use serde::{Deserialize, Serialize};

/// How a document's pages are materialized.
///
/// Selected by the analyzer from file size and page count; small documents
/// render everything up front, large ones fall back to progressively less
/// eager variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStrategy {
    /// Render every page before returning
    ImmediateFull,

    /// Render the first N pages, leave the rest as placeholders
    PriorityPages,

    /// Render the first chunk with cooperative yields, rest as placeholders
    ProgressiveChunked,

    /// Record the page count only; every page is a placeholder
    MetadataOnly,
}

impl ProcessingStrategy {
    /// Stable string form used in logs and state snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImmediateFull => "immediate_full",
            Self::PriorityPages => "priority_pages",
            Self::ProgressiveChunked => "progressive_chunked",
            Self::MetadataOnly => "metadata_only",
        }
    }
}

impl std::fmt::Display for ProcessingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thumbnail quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailQuality {
    Low,
    Medium,
    High,
}

impl ThumbnailQuality {
    /// Render scale hint passed to the page renderer.
    #[must_use]
    pub const fn scale(self) -> f32 {
        match self {
            Self::Low => 0.2,
            Self::Medium => 0.5,
            Self::High => 0.8,
        }
    }
}

/// Configuration for one processing run.
///
/// Built by merging [`ProcessingConfig::default`] with the analyzer's
/// recommended strategy and any caller overrides:
///
/// ```rust
/// use pageflow_core::{ProcessingConfig, ProcessingOverrides, ProcessingStrategy, ThumbnailQuality};
///
/// let config = ProcessingConfig::for_strategy(ProcessingStrategy::PriorityPages)
///     .apply(&ProcessingOverrides {
///         quality: Some(ThumbnailQuality::High),
///         ..Default::default()
///     });
/// assert_eq!(config.strategy, ProcessingStrategy::PriorityPages);
/// assert_eq!(config.quality, ThumbnailQuality::High);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Materialization strategy
    pub strategy: ProcessingStrategy,

    /// Pages rendered eagerly by the chunked strategy
    pub chunk_size: u32,

    /// Thumbnail quality tier
    pub quality: ThumbnailQuality,

    /// Pages rendered eagerly by the priority strategy
    pub priority_page_count: u32,

    /// Hint that the host should offload work to a background worker
    pub use_worker_hint: bool,

    /// Maximum retries for recoverable failures
    pub max_retries: u32,

    /// Overall run timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            strategy: ProcessingStrategy::ImmediateFull,
            chunk_size: 20,
            quality: ThumbnailQuality::Medium,
            priority_page_count: 10,
            use_worker_hint: false,
            max_retries: 3,
            timeout_ms: 300_000,
        }
    }
}

impl ProcessingConfig {
    /// Defaults with the given strategy.
    #[must_use]
    pub fn for_strategy(strategy: ProcessingStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Apply caller overrides on top of this configuration.
    #[must_use]
    pub fn apply(mut self, overrides: &ProcessingOverrides) -> Self {
        if let Some(strategy) = overrides.strategy {
            self.strategy = strategy;
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(quality) = overrides.quality {
            self.quality = quality;
        }
        if let Some(count) = overrides.priority_page_count {
            self.priority_page_count = count;
        }
        if let Some(hint) = overrides.use_worker_hint {
            self.use_worker_hint = hint;
        }
        if let Some(retries) = overrides.max_retries {
            self.max_retries = retries;
        }
        if let Some(timeout) = overrides.timeout_ms {
            self.timeout_ms = timeout;
        }
        self
    }

    /// Set the quality tier.
    #[must_use]
    pub const fn with_quality(mut self, quality: ThumbnailQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the run timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Caller overrides merged on top of defaults and analysis output.
///
/// Every field is optional; unset fields keep the merged value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOverrides {
    pub strategy: Option<ProcessingStrategy>,
    pub chunk_size: Option<u32>,
    pub quality: Option<ThumbnailQuality>,
    pub priority_page_count: Option<u32>,
    pub use_worker_hint: Option<bool>,
    pub max_retries: Option<u32>,
    pub timeout_ms: Option<u64>,
}
