//! Processing orchestrator
//!
//! The façade and state machine over everything else in this crate: dedupes
//! concurrent submissions per content fingerprint, dispatches the right
//! strategy executor through the retry layer, races it against timeout and
//! cancellation, maintains the subscribable state map and the process-wide
//! metrics, and serves cache hits immediately.
//!
//! Per-fingerprint lifecycle: `pending → processing → {completed | error |
//! cancelled}`. Terminal entries stay visible for a grace window so a slow
//! poller still observes them once, then are purged. All shared state is
//! owned by one orchestrator instance; mutation is serialized per key by the
//! state map's per-entry locking while distinct keys proceed in parallel.

use crate::analyzer::FileAnalyzer;
use crate::cache::{CacheConfig, CacheStats, ProcessingCache};
use crate::executor::{empty_document, executor_for, OpenHandle, ProgressSink, StrategyContext};
use crate::hasher::Sha256ContentHasher;
use crate::retry::{self, classify};
use crate::traits::{Clock, ContentHasher, DocumentSource, PageRenderer, SystemClock};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use pageflow_core::{
    EngineError, ErrorKind, FileAnalysis, InputFile, ProcessedDocument, ProcessingConfig,
    ProcessingError, ProcessingMetrics, ProcessingOverrides, ProcessingState, ProcessingStatus,
    ProcessingStrategy, Thumbnail, ThumbnailSlot,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Orchestrator-wide configuration.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Per-run defaults merged under the analyzer's recommendation
    pub defaults: ProcessingConfig,

    /// Result cache bounds
    pub cache: CacheConfig,

    /// How long a completed entry stays visible before purge
    pub completed_grace: Duration,

    /// How long a cancelled entry stays visible before purge
    pub cancelled_grace: Duration,

    /// How long an error entry stays visible before purge
    pub error_grace: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            defaults: ProcessingConfig::default(),
            cache: CacheConfig::default(),
            completed_grace: Duration::from_secs(2),
            cancelled_grace: Duration::from_secs(5),
            error_grace: Duration::from_secs(10),
        }
    }
}

/// One state-map mutation, delivered to subscribers.
///
/// `state: None` means the entry was purged after its grace window (or
/// removed by cleanup).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
    pub file_key: String,
    pub state: Option<ProcessingState>,
}

/// Handle for removing a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&StateEvent) + Send + Sync>;

/// In-flight tracking entry: the public snapshot plus the run's
/// cancellation handle and a generation tag that keeps delayed purges from
/// removing a successor entry for the same key.
struct TrackedState {
    state: ProcessingState,
    cancel: CancellationToken,
    generation: u64,
}

struct Shared {
    source: Arc<dyn DocumentSource>,
    renderer: Arc<dyn PageRenderer>,
    hasher: Arc<dyn ContentHasher>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    states: DashMap<String, TrackedState>,
    cache: Mutex<ProcessingCache>,
    listeners: Mutex<HashMap<u64, Listener>>,
    next_subscription: AtomicU64,
    generations: AtomicU64,
    metrics: Mutex<ProcessingMetrics>,
}

/// Adaptive document-processing façade.
///
/// Dependencies are injected; hosts that want process-wide behavior wrap
/// one instance in an `Arc` at startup instead of relying on global state.
pub struct ProcessingOrchestrator {
    shared: Arc<Shared>,
    analyzer: FileAnalyzer,
}

impl ProcessingOrchestrator {
    /// Create an orchestrator with the default hasher and system clock.
    #[must_use]
    pub fn new(
        source: Arc<dyn DocumentSource>,
        renderer: Arc<dyn PageRenderer>,
        config: PipelineConfig,
    ) -> Self {
        Self::with_dependencies(
            source,
            renderer,
            Arc::new(Sha256ContentHasher),
            Arc::new(SystemClock),
            config,
        )
    }

    /// Create an orchestrator with every dependency injected.
    #[must_use]
    pub fn with_dependencies(
        source: Arc<dyn DocumentSource>,
        renderer: Arc<dyn PageRenderer>,
        hasher: Arc<dyn ContentHasher>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        let cache = ProcessingCache::new(config.cache, Arc::clone(&clock));
        let shared = Arc::new(Shared {
            source: Arc::clone(&source),
            renderer,
            hasher,
            clock,
            config,
            states: DashMap::new(),
            cache: Mutex::new(cache),
            listeners: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            generations: AtomicU64::new(0),
            metrics: Mutex::new(ProcessingMetrics::default()),
        });
        Self {
            analyzer: FileAnalyzer::new(source),
            shared,
        }
    }

    /// Submit a file for processing.
    ///
    /// A cache hit returns the materialized document immediately. Otherwise
    /// `None` is returned and the result arrives through the state map: a
    /// fresh submission spawns exactly one executor task, while a duplicate
    /// of an in-flight fingerprint spawns nothing.
    pub async fn submit(
        &self,
        file: &InputFile,
        overrides: Option<ProcessingOverrides>,
    ) -> Option<Arc<ProcessedDocument>> {
        let file_key = self.shared.hasher.hash(file).await;

        if let Some(document) = self.shared.cache.lock().unwrap().get(&file_key) {
            debug!(file = %file.name, key = %file_key, "cache hit");
            self.shared.metrics.lock().unwrap().record_cache_hit();
            return Some(document);
        }

        // Cheap pre-check saves a probe open for an obvious duplicate; the
        // entry API below settles any remaining race.
        if self.shared.states.contains_key(&file_key) {
            debug!(key = %file_key, "duplicate submission, already in flight");
            return None;
        }

        let (analysis, lease) = self.analyzer.probe(file).await;
        let config = {
            let mut config = self.shared.config.defaults;
            config.strategy = analysis.recommended_strategy;
            config.apply(&overrides.unwrap_or_default())
        };

        let cancel = CancellationToken::new();
        let generation = self.shared.generations.fetch_add(1, Ordering::SeqCst);
        let state = ProcessingState::pending(
            &file_key,
            &file.name,
            config.strategy,
            self.shared.clock.now(),
            analysis.estimated_processing_time_ms,
        );

        match self.shared.states.entry(file_key.clone()) {
            Entry::Occupied(_) => {
                // Lost the race to a concurrent duplicate; its executor
                // wins, and dropping the lease closes the probe handle.
                debug!(key = %file_key, "concurrent duplicate submission, dedup");
                return None;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(TrackedState {
                    state: state.clone(),
                    cancel: cancel.clone(),
                    generation,
                });
            }
        }

        self.shared.metrics.lock().unwrap().record_started();
        self.shared.broadcast(&StateEvent {
            file_key: file_key.clone(),
            state: Some(state),
        });
        info!(
            file = %file.name,
            key = %file_key,
            strategy = %config.strategy,
            "processing started"
        );

        tokio::spawn(Shared::run_submission(
            Arc::clone(&self.shared),
            file.clone(),
            file_key,
            config,
            analysis,
            lease,
            cancel,
            generation,
        ));
        None
    }

    /// Re-submit a file as a fresh request.
    ///
    /// Bypasses the in-flight dedup only when the previous attempt reached
    /// a terminal state; an active run is left alone.
    pub async fn retry(
        &self,
        file: &InputFile,
        overrides: Option<ProcessingOverrides>,
    ) -> Option<Arc<ProcessedDocument>> {
        let file_key = self.shared.hasher.hash(file).await;
        if let Some(entry) = self.shared.states.get(&file_key) {
            if !entry.state.status.is_terminal() {
                debug!(key = %file_key, "retry ignored, previous attempt still in flight");
                return None;
            }
        }
        self.shared
            .states
            .remove_if(&file_key, |_, tracked| tracked.state.status.is_terminal());
        self.submit(file, overrides).await
    }

    /// Request cancellation of an in-flight run.
    ///
    /// Cooperative: the executor observes the token at its next page
    /// boundary (or suspension point) and transitions to `cancelled`.
    pub fn cancel(&self, file_key: &str) {
        let Some(entry) = self.shared.states.get(file_key) else {
            debug!(key = %file_key, "cancel ignored, no such submission");
            return;
        };
        if entry.state.status.is_terminal() {
            return;
        }
        info!(key = %file_key, "cancellation requested");
        entry.cancel.cancel();
    }

    /// Register a listener for state-map mutations.
    pub fn subscribe(
        &self,
        callback: impl Fn(&StateEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.shared.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.shared
            .listeners
            .lock()
            .unwrap()
            .insert(id, Arc::new(callback));
        SubscriptionId(id)
    }

    /// Remove a listener.
    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.shared.listeners.lock().unwrap().remove(&subscription.0);
    }

    /// Pull snapshot of the full state map.
    #[must_use]
    pub fn states(&self) -> HashMap<String, ProcessingState> {
        self.shared
            .states
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state.clone()))
            .collect()
    }

    /// Current metrics, with resident memory refreshed.
    #[must_use]
    pub fn metrics(&self) -> ProcessingMetrics {
        let mut metrics = self.shared.metrics.lock().unwrap().clone();
        metrics.memory_usage_bytes = process_memory_bytes();
        metrics
    }

    /// Result cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.shared.cache.lock().unwrap().stats()
    }

    /// Hydrate one placeholder page of a cached document.
    ///
    /// Re-opens the source, renders exactly the requested page, and
    /// re-inserts a cloned document with that slot filled. Pages that are
    /// already rendered are returned as-is.
    pub async fn load_page(
        &self,
        file: &InputFile,
        page_number: u32,
    ) -> Result<Option<Thumbnail>, ProcessingError> {
        let file_key = self.shared.hasher.hash(file).await;
        let document = self
            .shared
            .cache
            .lock()
            .unwrap()
            .get(&file_key)
            .ok_or_else(|| {
                ProcessingError::new(ErrorKind::Parsing, "no cached document to hydrate")
            })?;
        let page = document
            .pages
            .iter()
            .find(|page| page.page_number == page_number)
            .ok_or_else(|| {
                ProcessingError::new(
                    ErrorKind::Parsing,
                    format!("page {page_number} out of range"),
                )
            })?;
        if !page.thumbnail.is_pending() {
            return Ok(page.thumbnail.as_ready().cloned());
        }

        let rendered: Result<Option<Thumbnail>, EngineError> = async {
            let handle = OpenHandle::new(self.shared.source.open(file.bytes()).await?);
            let page_handle = handle.page(page_number).await?;
            self.shared
                .renderer
                .render(page_handle.as_ref(), self.shared.config.defaults.quality)
                .await
        }
        .await;

        match rendered {
            Ok(thumbnail) => {
                let slot = ThumbnailSlot::from_render(thumbnail.clone());
                let modified_at = self.shared.clock.now();
                let mut cache = self.shared.cache.lock().unwrap();
                // Re-read under the lock so concurrent hydrations compose
                // instead of overwriting each other's slots.
                if let Some(current) = cache.get(&file_key) {
                    if let Some(updated) =
                        current.with_hydrated_page(page_number, slot, modified_at)
                    {
                        cache.set(file_key.clone(), Arc::new(updated));
                    }
                }
                debug!(key = %file_key, page = page_number, "hydrated placeholder page");
                Ok(thumbnail)
            }
            Err(engine_error) => {
                let kind = classify(&engine_error);
                Err(ProcessingError {
                    kind,
                    message: engine_error.to_string(),
                    recoverable: false,
                    retry_count: 0,
                    max_retries: 0,
                    cause: Some(Arc::new(engine_error)),
                })
            }
        }
    }

    /// Drop cache entries and cancel in-flight work for files the caller no
    /// longer references.
    pub async fn cleanup(&self, files: &[InputFile]) {
        for file in files {
            let file_key = self.shared.hasher.hash(file).await;
            self.shared.cache.lock().unwrap().delete(&file_key);
            if let Some(entry) = self.shared.states.get(&file_key) {
                entry.cancel.cancel();
            }
            if self.shared.states.remove(&file_key).is_some() {
                debug!(key = %file_key, "cleaned up state for removed file");
                self.shared.broadcast(&StateEvent {
                    file_key,
                    state: None,
                });
            }
        }
    }

    /// Cancel everything and drop all state and cached results.
    pub fn clear_all(&self) {
        info!("clearing all processing state and cache");
        let keys: Vec<String> = self
            .shared
            .states
            .iter()
            .map(|entry| {
                entry.value().cancel.cancel();
                entry.key().clone()
            })
            .collect();
        self.shared.states.clear();
        for file_key in keys {
            self.shared.broadcast(&StateEvent {
                file_key,
                state: None,
            });
        }
        self.shared.cache.lock().unwrap().clear();
    }
}

/// Per-run progress sink: clamps progress to be monotonic while processing
/// and refreshes the remaining-time estimate from the elapsed/progress
/// ratio.
struct StateProgress {
    shared: Arc<Shared>,
    file_key: String,
    started: Instant,
}

impl ProgressSink for StateProgress {
    fn report(&self, progress: f32, current_page: Option<u32>) {
        self.shared
            .update_progress(&self.file_key, progress, current_page, self.started.elapsed());
    }
}

impl Shared {
    #[allow(clippy::too_many_arguments)]
    async fn run_submission(
        self: Arc<Self>,
        file: InputFile,
        file_key: String,
        config: ProcessingConfig,
        analysis: FileAnalysis,
        lease: Option<OpenHandle>,
        cancel: CancellationToken,
        generation: u64,
    ) {
        let started = Instant::now();
        self.transition(&file_key, |state| {
            state.status = ProcessingStatus::Processing;
        });

        let progress = StateProgress {
            shared: Arc::clone(&self),
            file_key: file_key.clone(),
            started,
        };
        let timeout = retry::timeout_controller(Duration::from_millis(config.timeout_ms));

        // The context borrows its own copy of the key: `file_key` itself is
        // moved into the purge scheduler while the attempt future is alive.
        let ctx_key = file_key.clone();
        let strategy_ctx = StrategyContext {
            source: &*self.source,
            renderer: &*self.renderer,
            clock: &*self.clock,
            file_key: &ctx_key,
        };
        let executor = executor_for(config.strategy);
        // Input the probe already diagnosed as unreadable still completes,
        // as an empty metadata-only result.
        let unreadable =
            analysis.is_corrupted && config.strategy == ProcessingStrategy::MetadataOnly;

        let on_error = {
            let shared = Arc::clone(&self);
            let file_key = file_key.clone();
            move |error: &ProcessingError| {
                warn!(
                    key = %file_key,
                    kind = error.kind.as_str(),
                    attempt = error.retry_count,
                    "attempt failed: {}",
                    error.message
                );
                let error = error.clone();
                shared.transition(&file_key, move |state| {
                    state.error = Some(error);
                });
            }
        };

        let attempt = {
            let mut lease = lease;
            let ctx = &strategy_ctx;
            let file = &file;
            let config = &config;
            let progress = &progress;
            let cancel = &cancel;
            retry::execute_with_retry(
                move || {
                    let leased = lease.take();
                    async move {
                        if unreadable {
                            progress.report(50.0, None);
                            let document = empty_document(ctx, file);
                            progress.report(100.0, None);
                            return Ok(document);
                        }
                        let document = match leased {
                            Some(handle) => handle,
                            None => OpenHandle::new(ctx.source.open(file.bytes()).await?),
                        };
                        executor
                            .run(ctx, file, document, config, progress, cancel)
                            .await
                    }
                },
                on_error,
                config.max_retries,
            )
        };
        tokio::pin!(attempt);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                Err(ProcessingError::new(ErrorKind::Cancelled, "processing cancelled"))
            }
            () = timeout.cancelled() => {
                Err(ProcessingError::new(
                    ErrorKind::Timeout,
                    format!("processing timed out after {}ms", config.timeout_ms),
                ))
            }
            result = &mut attempt => result,
        };
        // Reap the timer task if it has not fired.
        timeout.cancel();

        match outcome {
            Ok(document) => {
                if cancel.is_cancelled() {
                    // A cancel that landed after the final page still wins:
                    // a cancelled submission never reports completed.
                    info!(key = %file_key, "processing cancelled");
                    Self::finalize_cancelled(&self, &file_key, generation);
                    return;
                }
                let document = Arc::new(document);
                // Cache before flipping status: a completed state always
                // has a cached result behind it.
                self.cache
                    .lock()
                    .unwrap()
                    .set(file_key.clone(), Arc::clone(&document));
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.metrics.lock().unwrap().record_completed(elapsed_ms);
                let completed_at = self.clock.now();
                self.transition(&file_key, move |state| {
                    state.status = ProcessingStatus::Completed;
                    state.progress = 100.0;
                    state.completed_at = Some(completed_at);
                    state.estimated_time_remaining_ms = 0;
                });
                info!(
                    key = %file_key,
                    elapsed_ms,
                    pages = document.total_pages,
                    "processing completed"
                );
                Self::schedule_purge(&self, file_key, generation, self.config.completed_grace);
            }
            Err(error) if error.kind == ErrorKind::Cancelled => {
                info!(key = %file_key, "processing cancelled");
                Self::finalize_cancelled(&self, &file_key, generation);
            }
            Err(error) => {
                warn!(
                    key = %file_key,
                    kind = error.kind.as_str(),
                    "processing failed: {}",
                    error.message
                );
                self.metrics.lock().unwrap().record_failed();
                let completed_at = self.clock.now();
                self.transition(&file_key, move |state| {
                    state.status = ProcessingStatus::Error;
                    state.error = Some(error);
                    state.completed_at = Some(completed_at);
                });
                Self::schedule_purge(&self, file_key, generation, self.config.error_grace);
            }
        }
    }

    fn finalize_cancelled(shared: &Arc<Self>, file_key: &str, generation: u64) {
        let completed_at = shared.clock.now();
        shared.transition(file_key, move |state| {
            state.status = ProcessingStatus::Cancelled;
            state.error = None;
            state.completed_at = Some(completed_at);
        });
        Self::schedule_purge(
            shared,
            file_key.to_string(),
            generation,
            shared.config.cancelled_grace,
        );
    }

    /// Apply a mutation to one tracked state and broadcast the new snapshot.
    fn transition(&self, file_key: &str, mutate: impl FnOnce(&mut ProcessingState)) {
        let snapshot = {
            let Some(mut entry) = self.states.get_mut(file_key) else {
                return;
            };
            mutate(&mut entry.state);
            entry.state.clone()
        };
        self.broadcast(&StateEvent {
            file_key: file_key.to_string(),
            state: Some(snapshot),
        });
    }

    fn update_progress(
        &self,
        file_key: &str,
        progress: f32,
        current_page: Option<u32>,
        elapsed: Duration,
    ) {
        let snapshot = {
            let Some(mut entry) = self.states.get_mut(file_key) else {
                return;
            };
            if entry.state.status != ProcessingStatus::Processing {
                return;
            }
            let state = &mut entry.state;
            let clamped = progress.clamp(0.0, 100.0);
            if clamped > state.progress {
                state.progress = clamped;
            }
            if let Some(page) = current_page {
                state.current_page = Some(page);
            }
            if state.progress > 0.0 {
                let remaining = elapsed.as_millis() as f64
                    * f64::from(100.0 - state.progress)
                    / f64::from(state.progress);
                state.estimated_time_remaining_ms = remaining.max(0.0) as u64;
            }
            state.clone()
        };
        self.broadcast(&StateEvent {
            file_key: file_key.to_string(),
            state: Some(snapshot),
        });
    }

    fn broadcast(&self, event: &StateEvent) {
        // Clone the listener list out of the lock so callbacks can call
        // back into the orchestrator without deadlocking.
        let listeners: Vec<Listener> = self.listeners.lock().unwrap().values().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Remove the entry after its grace window, unless a newer submission
    /// for the same key has replaced it.
    fn schedule_purge(shared: &Arc<Self>, file_key: String, generation: u64, grace: Duration) {
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let removed = shared
                .states
                .remove_if(&file_key, |_, tracked| tracked.generation == generation);
            if removed.is_some() {
                debug!(key = %file_key, "purged terminal state after grace window");
                shared.broadcast(&StateEvent {
                    file_key,
                    state: None,
                });
            }
        });
    }
}

/// Resident memory of the current process.
fn process_memory_bytes() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut system = sysinfo::System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map_or(0, |process| process.memory())
}
