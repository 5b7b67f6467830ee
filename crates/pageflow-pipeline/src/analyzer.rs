//! File analysis and strategy recommendation
//!
//! Analysis never fails: unreadable input comes back as a `FileAnalysis`
//! with the corruption or encryption flag set and lands in the
//! metadata-only tier through the decision table. A cheap magic-byte probe
//! runs before the heavy open so obviously non-document bytes never reach
//! the engine.

use crate::executor::OpenHandle;
use crate::traits::DocumentSource;
use pageflow_core::{
    estimate_processing_time_ms, looks_like_document, memory_warning, recommended_batch_size,
    select_strategy, should_use_worker, BatchAnalysis, EngineError, FileAnalysis, InputFile,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Inspects files and recommends a processing strategy.
pub struct FileAnalyzer {
    source: Arc<dyn DocumentSource>,
}

impl FileAnalyzer {
    /// Create an analyzer probing through the given engine.
    #[must_use]
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self { source }
    }

    /// Cheap magic-byte check, run before any heavy open attempt.
    #[must_use]
    pub fn is_valid_document(file: &InputFile) -> bool {
        looks_like_document(file.bytes())
    }

    /// Analyze a file.
    ///
    /// Never returns an error for any byte input: corrupt, encrypted, empty,
    /// and truncated files are all reported through the analysis flags.
    pub async fn analyze(&self, file: &InputFile) -> FileAnalysis {
        let (analysis, _handle) = self.probe(file).await;
        analysis
    }

    /// Analyze a file and keep the probe handle open on success.
    ///
    /// The orchestrator hands the live handle to the first executor attempt
    /// so a successful run opens the document exactly once; standalone
    /// callers use [`FileAnalyzer::analyze`], which drops (and thereby
    /// closes) the handle.
    pub async fn probe(&self, file: &InputFile) -> (FileAnalysis, Option<OpenHandle>) {
        let file_size = file.size();

        if !Self::is_valid_document(file) {
            debug!(
                file = %file.name,
                file_size, "magic-byte probe rejected input, skipping open"
            );
            return (Self::unreadable(file_size, false), None);
        }

        match self.source.open(file.bytes()).await {
            Ok(handle) => {
                let handle = OpenHandle::new(handle);
                let page_count = Some(handle.page_count());
                let is_encrypted = handle.is_encrypted();
                let strategy = select_strategy(file_size, page_count);
                let analysis = FileAnalysis {
                    file_size,
                    estimated_page_count: page_count,
                    is_encrypted,
                    is_corrupted: false,
                    recommended_strategy: strategy,
                    estimated_processing_time_ms: estimate_processing_time_ms(
                        strategy, page_count,
                    ),
                };
                (analysis, Some(handle))
            }
            Err(EngineError::Encrypted) => {
                debug!(file = %file.name, "probe open reported password protection");
                (Self::unreadable(file_size, true), None)
            }
            Err(error) => {
                warn!(file = %file.name, %error, "probe open failed, treating as corrupted");
                (Self::unreadable(file_size, false), None)
            }
        }
    }

    /// Analyze a batch and derive aggregate scheduling hints.
    pub async fn analyze_batch(&self, files: &[InputFile]) -> BatchAnalysis {
        let mut analyses = Vec::with_capacity(files.len());
        for file in files {
            analyses.push(self.analyze(file).await);
        }

        let total_size_bytes: u64 = analyses.iter().map(|analysis| analysis.file_size).sum();
        let total_estimated_pages: u64 = analyses
            .iter()
            .filter_map(|analysis| analysis.estimated_page_count)
            .map(u64::from)
            .sum();

        BatchAnalysis {
            recommended_batch_size: recommended_batch_size(files.len(), total_size_bytes),
            should_use_worker: should_use_worker(total_size_bytes, total_estimated_pages),
            memory_warning: memory_warning(total_size_bytes, total_estimated_pages),
            analyses,
            total_size_bytes,
            total_estimated_pages,
        }
    }

    fn unreadable(file_size: u64, is_encrypted: bool) -> FileAnalysis {
        let strategy = select_strategy(file_size, None);
        FileAnalysis {
            file_size,
            estimated_page_count: None,
            is_encrypted,
            is_corrupted: !is_encrypted,
            recommended_strategy: strategy,
            estimated_processing_time_ms: estimate_processing_time_ms(strategy, None),
        }
    }
}
