//! # pageflow-pipeline - Adaptive Document Processing
//!
//! Orchestration layer for client-side document thumbnailing: picks a
//! materialization strategy from file characteristics, executes it
//! progressively without starving the host, caches completed results, and
//! drives retry with a closed error taxonomy.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       ProcessingOrchestrator                         │
//! │   hash → cache lookup → analyze → config → spawn strategy executor   │
//! └──────────────────────────────────────────────────────────────────────┘
//!                  │                                     │
//!                  ▼                                     ▼
//! ┌─────────────────────────────┐      ┌──────────────────────────────────┐
//! │   Retry / classification    │      │  DocumentSource / PageRenderer   │
//! │   backoff, timeout racing   │      │  (engine capabilities, injected) │
//! └─────────────────────────────┘      └──────────────────────────────────┘
//!                  │
//!                  ▼
//! ┌─────────────────────────────┐      ┌──────────────────────────────────┐
//! │  ProcessingCache (LRU/TTL)  │      │  State map + diff subscriptions  │
//! └─────────────────────────────┘      └──────────────────────────────────┘
//! ```
//!
//! The document engine itself is out of scope: parsing, rasterization, and
//! handle pooling are consumed behind the [`traits`] capabilities. One
//! orchestrator instance owns all shared state; hosts that want the
//! process-wide behavior of a singleton wrap it in an `Arc` at startup.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pageflow_pipeline::{ProcessingOrchestrator, PipelineConfig};
//! use pageflow_core::InputFile;
//!
//! let orchestrator = ProcessingOrchestrator::new(
//!     source,   // Arc<dyn DocumentSource>
//!     renderer, // Arc<dyn PageRenderer>
//!     PipelineConfig::default(),
//! );
//!
//! let subscription = orchestrator.subscribe(|event| {
//!     println!("{}: {:?}", event.file_key, event.state.as_ref().map(|s| s.status));
//! });
//!
//! let file = InputFile::new("report.pdf", bytes);
//! if let Some(document) = orchestrator.submit(&file, None).await {
//!     // cache hit: the document is already materialized
//! }
//! # let _ = subscription;
//! ```

pub mod analyzer;
pub mod cache;
pub mod executor;
pub mod hasher;
pub mod orchestrator;
pub mod retry;
pub mod traits;

pub use analyzer::FileAnalyzer;
pub use cache::{CacheConfig, CacheStats, ProcessingCache};
pub use executor::{
    executor_for, ImmediateFullExecutor, MetadataOnlyExecutor, OpenHandle,
    PriorityPagesExecutor, ProgressSink, ProgressiveChunkedExecutor, StrategyContext,
    StrategyExecutor,
};
pub use hasher::Sha256ContentHasher;
pub use orchestrator::{
    PipelineConfig, ProcessingOrchestrator, StateEvent, SubscriptionId,
};
pub use retry::{
    backoff_delay, classify, execute_with_retry, is_recoverable, timeout_controller,
    BACKOFF_SCHEDULE_MS,
};
pub use traits::{
    Clock, ContentHasher, DocumentHandle, DocumentSource, PageHandle, PageRenderer, SystemClock,
};
