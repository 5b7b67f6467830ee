//! File analysis results and the strategy decision table
//!
//! Strategy selection is a pure function of file size and page count so it
//! can be tested exhaustively at the tier boundaries. The analyzer in
//! `pageflow-pipeline` fills in the probing parts (open attempt, encryption
//! and corruption detection) and delegates here for the decision itself.

use crate::config::ProcessingStrategy;
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Size ceiling for the immediate-full tier.
pub const IMMEDIATE_FULL_MAX_BYTES: u64 = 10 * MIB;
/// Size ceiling for the priority-pages tier.
pub const PRIORITY_PAGES_MAX_BYTES: u64 = 50 * MIB;
/// Size ceiling for the progressive-chunked tier.
pub const PROGRESSIVE_CHUNKED_MAX_BYTES: u64 = 200 * MIB;

/// Page ceilings for the corresponding tiers.
pub const IMMEDIATE_FULL_MAX_PAGES: u32 = 10;
pub const PRIORITY_PAGES_MAX_PAGES: u32 = 50;
pub const PROGRESSIVE_CHUNKED_MAX_PAGES: u32 = 100;

/// Pick a processing strategy from file characteristics.
///
/// The decision table is evaluated in order, first match wins; boundary
/// values select the more eager tier. An unknown or zero page count always
/// lands in `MetadataOnly`, since there is nothing to schedule eagerly.
#[must_use]
pub fn select_strategy(file_size: u64, page_count: Option<u32>) -> ProcessingStrategy {
    let pages = match page_count {
        None | Some(0) => return ProcessingStrategy::MetadataOnly,
        Some(pages) => pages,
    };

    if file_size <= IMMEDIATE_FULL_MAX_BYTES && pages <= IMMEDIATE_FULL_MAX_PAGES {
        ProcessingStrategy::ImmediateFull
    } else if file_size <= PRIORITY_PAGES_MAX_BYTES && pages <= PRIORITY_PAGES_MAX_PAGES {
        ProcessingStrategy::PriorityPages
    } else if file_size <= PROGRESSIVE_CHUNKED_MAX_BYTES && pages <= PROGRESSIVE_CHUNKED_MAX_PAGES {
        ProcessingStrategy::ProgressiveChunked
    } else {
        ProcessingStrategy::MetadataOnly
    }
}

/// Estimate processing time for a strategy, in milliseconds.
///
/// Per-page base costs reflect how much eager work each strategy performs:
/// the lazy strategies only pay for the pages they actually render.
#[must_use]
pub fn estimate_processing_time_ms(strategy: ProcessingStrategy, page_count: Option<u32>) -> u64 {
    let pages = u64::from(page_count.unwrap_or(0));
    match strategy {
        ProcessingStrategy::ImmediateFull => 200 * pages,
        ProcessingStrategy::PriorityPages => 150 * pages.min(10),
        ProcessingStrategy::ProgressiveChunked => 100 * pages.min(20),
        ProcessingStrategy::MetadataOnly => 50,
    }
}

/// Result of analyzing one input file.
///
/// Produced once per submission and never raised as an error: unreadable
/// input is reported through the `is_encrypted`/`is_corrupted` flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// File size in bytes
    pub file_size: u64,

    /// Page count from the probing open, when it succeeded
    pub estimated_page_count: Option<u32>,

    /// The document requires a password
    pub is_encrypted: bool,

    /// The document could not be opened for another reason
    pub is_corrupted: bool,

    /// Strategy recommended by the decision table
    pub recommended_strategy: ProcessingStrategy,

    /// Time estimate for the recommended strategy
    pub estimated_processing_time_ms: u64,
}

/// Aggregate analysis over a batch of files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAnalysis {
    /// Per-file analyses, in input order
    pub analyses: Vec<FileAnalysis>,

    /// Sum of file sizes
    pub total_size_bytes: u64,

    /// Sum of known page counts
    pub total_estimated_pages: u64,

    /// How many files to process concurrently
    pub recommended_batch_size: usize,

    /// The host should offload this batch to a background worker
    pub should_use_worker: bool,

    /// The batch is large enough to risk memory pressure
    pub memory_warning: bool,
}

/// Recommended concurrent batch size for an aggregate input size.
///
/// Full count for small batches, halved for medium, quartered for large.
#[must_use]
pub fn recommended_batch_size(file_count: usize, total_size_bytes: u64) -> usize {
    let size = if total_size_bytes <= 50 * MIB {
        file_count
    } else if total_size_bytes <= 200 * MIB {
        file_count / 2
    } else {
        file_count / 4
    };
    size.max(1)
}

/// Whether aggregate load justifies offloading to a worker.
#[must_use]
pub fn should_use_worker(total_size_bytes: u64, total_pages: u64) -> bool {
    total_size_bytes > 100 * MIB || total_pages > 200
}

/// Whether aggregate load risks memory pressure.
#[must_use]
pub fn memory_warning(total_size_bytes: u64, total_pages: u64) -> bool {
    total_size_bytes > 500 * MIB || total_pages > 1000
}
