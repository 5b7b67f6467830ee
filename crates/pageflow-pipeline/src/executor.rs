//! Strategy executors
//!
//! Four materialization strategies behind one contract. Executors receive an
//! already-open document handle (the analyzer's probe handle on the first
//! attempt, a fresh open on retries), poll the cancellation token before
//! every page, and report strictly increasing progress for their eager
//! segment. Pages beyond the eager segment become `Pending` placeholders
//! for later hydration.
//!
//! The handle travels inside an [`OpenHandle`] guard, so every exit path
//! (success, engine error, cancellation, or the whole future being dropped
//! by the timeout race) releases it exactly once.

use crate::traits::{Clock, DocumentHandle, DocumentSource, PageRenderer};
use async_trait::async_trait;
use pageflow_core::{
    DocumentMetadata, EngineError, InputFile, PageEntry, ProcessedDocument, ProcessingConfig,
    ProcessingStrategy,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Engine capabilities and identity for one run.
pub struct StrategyContext<'a> {
    /// Document engine
    pub source: &'a dyn DocumentSource,

    /// Thumbnail renderer
    pub renderer: &'a dyn PageRenderer,

    /// Wall clock for result timestamps
    pub clock: &'a dyn Clock,

    /// Content fingerprint of the file being processed
    pub file_key: &'a str,
}

/// Receives progress updates from an executor.
///
/// Implementations must tolerate repeated values; the orchestrator's sink
/// additionally clamps progress to be monotonic while processing.
pub trait ProgressSink: Send + Sync {
    /// Report overall progress (0–100) and the page being worked on.
    fn report(&self, progress: f32, current_page: Option<u32>);
}

/// RAII wrapper around an open document handle.
///
/// Dropping the guard closes the handle; [`OpenHandle::into_inner`] is not
/// offered so a handle can never escape the close-exactly-once guarantee.
pub struct OpenHandle {
    inner: Option<Box<dyn DocumentHandle>>,
}

impl OpenHandle {
    /// Wrap a freshly opened handle.
    #[must_use]
    pub fn new(handle: Box<dyn DocumentHandle>) -> Self {
        Self {
            inner: Some(handle),
        }
    }
}

impl std::ops::Deref for OpenHandle {
    type Target = dyn DocumentHandle;

    fn deref(&self) -> &Self::Target {
        self.inner
            .as_deref()
            .expect("document handle present until drop")
    }
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.take() {
            handle.close();
        }
    }
}

/// Shared contract for the four materialization strategies.
///
/// On cancellation an executor aborts immediately with
/// [`EngineError::Cancelled`]; already-rendered pages for the run are
/// discarded and no partial document reaches the caller.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    /// The strategy this executor implements.
    fn strategy(&self) -> ProcessingStrategy;

    /// Materialize the document.
    async fn run(
        &self,
        ctx: &StrategyContext<'_>,
        file: &InputFile,
        document: OpenHandle,
        config: &ProcessingConfig,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ProcessedDocument, EngineError>;
}

/// Executor for the given strategy.
#[must_use]
pub fn executor_for(strategy: ProcessingStrategy) -> &'static dyn StrategyExecutor {
    match strategy {
        ProcessingStrategy::ImmediateFull => &ImmediateFullExecutor,
        ProcessingStrategy::PriorityPages => &PriorityPagesExecutor,
        ProcessingStrategy::ProgressiveChunked => &ProgressiveChunkedExecutor,
        ProcessingStrategy::MetadataOnly => &MetadataOnlyExecutor,
    }
}

/// Assemble the result document around the rendered pages.
fn build_document(
    ctx: &StrategyContext<'_>,
    file: &InputFile,
    pages: Vec<PageEntry>,
    total_pages: u32,
) -> ProcessedDocument {
    let now = ctx.clock.now();
    let key_prefix: String = ctx.file_key.chars().take(8).collect();
    ProcessedDocument {
        id: format!("{}-{key_prefix}", now.timestamp_millis()),
        pages,
        total_pages,
        metadata: DocumentMetadata {
            title: file.name.clone(),
            created_at: now,
            modified_at: now,
        },
    }
}

/// Empty result for input the engine cannot open at all.
pub(crate) fn empty_document(ctx: &StrategyContext<'_>, file: &InputFile) -> ProcessedDocument {
    build_document(ctx, file, Vec::new(), 0)
}

async fn render_page(
    ctx: &StrategyContext<'_>,
    document: &OpenHandle,
    file: &InputFile,
    config: &ProcessingConfig,
    page_number: u32,
) -> Result<PageEntry, EngineError> {
    let page = document.page(page_number).await?;
    let thumbnail = ctx.renderer.render(page.as_ref(), config.quality).await?;
    Ok(PageEntry::rendered(&file.name, page_number, thumbnail))
}

/// Renders every page before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateFullExecutor;

#[async_trait]
impl StrategyExecutor for ImmediateFullExecutor {
    fn strategy(&self) -> ProcessingStrategy {
        ProcessingStrategy::ImmediateFull
    }

    async fn run(
        &self,
        ctx: &StrategyContext<'_>,
        file: &InputFile,
        document: OpenHandle,
        config: &ProcessingConfig,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ProcessedDocument, EngineError> {
        let total = document.page_count();
        progress.report(10.0, None);

        let mut pages = Vec::with_capacity(total as usize);
        for page_number in 1..=total {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            pages.push(render_page(ctx, &document, file, config, page_number).await?);
            progress.report(
                10.0 + (page_number as f32 / total as f32) * 85.0,
                Some(page_number),
            );
        }

        progress.report(100.0, None);
        Ok(build_document(ctx, file, pages, total))
    }
}

/// Renders the first `priority_page_count` pages, rest as placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityPagesExecutor;

#[async_trait]
impl StrategyExecutor for PriorityPagesExecutor {
    fn strategy(&self) -> ProcessingStrategy {
        ProcessingStrategy::PriorityPages
    }

    async fn run(
        &self,
        ctx: &StrategyContext<'_>,
        file: &InputFile,
        document: OpenHandle,
        config: &ProcessingConfig,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ProcessedDocument, EngineError> {
        let total = document.page_count();
        progress.report(10.0, None);

        let priority = config.priority_page_count.min(total);
        let mut pages = Vec::with_capacity(total as usize);
        for page_number in 1..=priority {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            pages.push(render_page(ctx, &document, file, config, page_number).await?);
            progress.report(
                10.0 + (page_number as f32 / priority as f32) * 60.0,
                Some(page_number),
            );
        }

        for page_number in priority + 1..=total {
            pages.push(PageEntry::placeholder(&file.name, page_number));
        }

        progress.report(100.0, None);
        Ok(build_document(ctx, file, pages, total))
    }
}

/// Renders the first chunk with cooperative yields, rest as placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressiveChunkedExecutor;

/// Yield back to the scheduler after this many consecutive renders.
const YIELD_EVERY_PAGES: u32 = 5;

#[async_trait]
impl StrategyExecutor for ProgressiveChunkedExecutor {
    fn strategy(&self) -> ProcessingStrategy {
        ProcessingStrategy::ProgressiveChunked
    }

    async fn run(
        &self,
        ctx: &StrategyContext<'_>,
        file: &InputFile,
        document: OpenHandle,
        config: &ProcessingConfig,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ProcessedDocument, EngineError> {
        let total = document.page_count();
        progress.report(10.0, None);

        let first_chunk = config.chunk_size.min(total);
        let mut pages = Vec::with_capacity(total as usize);
        for page_number in 1..=first_chunk {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            pages.push(render_page(ctx, &document, file, config, page_number).await?);
            progress.report(
                10.0 + (page_number as f32 / total as f32) * 70.0,
                Some(page_number),
            );

            if page_number % YIELD_EVERY_PAGES == 0 {
                tokio::task::yield_now().await;
            }
        }

        for page_number in first_chunk + 1..=total {
            pages.push(PageEntry::placeholder(&file.name, page_number));
        }

        progress.report(100.0, None);
        Ok(build_document(ctx, file, pages, total))
    }
}

/// Records the page count only; every page is a placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataOnlyExecutor;

#[async_trait]
impl StrategyExecutor for MetadataOnlyExecutor {
    fn strategy(&self) -> ProcessingStrategy {
        ProcessingStrategy::MetadataOnly
    }

    async fn run(
        &self,
        ctx: &StrategyContext<'_>,
        file: &InputFile,
        document: OpenHandle,
        _config: &ProcessingConfig,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ProcessedDocument, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let total = document.page_count();
        progress.report(50.0, None);
        debug!(total_pages = total, "metadata-only run, no pages rendered");

        let pages = (1..=total)
            .map(|page_number| PageEntry::placeholder(&file.name, page_number))
            .collect();

        progress.report(100.0, None);
        Ok(build_document(ctx, file, pages, total))
    }
}
