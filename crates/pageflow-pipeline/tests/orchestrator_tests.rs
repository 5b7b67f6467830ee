//! End-to-end orchestrator behavior against scripted engine mocks.

mod common;

use common::{
    file_key, garbage_file, pdf_file, wait_until, EventLog, MockDocumentSource, MockPageRenderer,
    OpenFailure,
};
use pageflow_core::{
    ProcessingConfig, ProcessingOverrides, ProcessingStatus, ProcessingStrategy, ErrorKind,
};
use pageflow_pipeline::{
    DocumentSource, PageRenderer, PipelineConfig, ProcessingOrchestrator,
};
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(
    source: &Arc<MockDocumentSource>,
    renderer: &Arc<MockPageRenderer>,
    config: PipelineConfig,
) -> ProcessingOrchestrator {
    let source: Arc<dyn DocumentSource> = Arc::clone(source) as Arc<dyn DocumentSource>;
    let renderer: Arc<dyn PageRenderer> = Arc::clone(renderer) as Arc<dyn PageRenderer>;
    ProcessingOrchestrator::new(source, renderer, config)
}

fn completed_in(log: &EventLog) -> bool {
    log.snapshot().iter().any(|event| {
        event
            .state
            .as_ref()
            .is_some_and(|state| state.status == ProcessingStatus::Completed)
    })
}

fn terminal_status(log: &EventLog) -> Option<ProcessingStatus> {
    log.snapshot()
        .iter()
        .filter_map(|event| event.state.as_ref())
        .find(|state| state.status.is_terminal())
        .map(|state| state.status)
}

#[tokio::test]
async fn scenario_a_small_document_renders_every_page() {
    let source = MockDocumentSource::with_pages(2);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("small.pdf", 500 * 1024, 1);
    assert!(orchestrator.submit(&file, None).await.is_none());

    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);

    // Strategy picked from 500KB / 2 pages
    let states: Vec<_> = log
        .snapshot()
        .iter()
        .filter_map(|event| event.state.clone())
        .collect();
    assert!(states
        .iter()
        .all(|state| state.strategy == ProcessingStrategy::ImmediateFull));

    let final_state = states
        .iter()
        .find(|state| state.status == ProcessingStatus::Completed)
        .cloned()
        .expect("completed state");
    assert!((final_state.progress - 100.0).abs() < f32::EPSILON);

    // Second submission is a synchronous cache hit
    let document = orchestrator
        .submit(&file, None)
        .await
        .expect("cached document");
    assert_eq!(document.total_pages, 2);
    assert_eq!(document.pages.len(), 2);
    assert_eq!(document.placeholder_count(), 0);
    assert!(document
        .pages
        .iter()
        .all(|page| page.thumbnail.as_ready().is_some()));
    assert_eq!(renderer.renders(), 2);
}

#[tokio::test]
async fn scenario_b_unreadable_input_completes_empty() {
    let source = MockDocumentSource::with_pages(10);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = garbage_file("broken.bin");
    assert!(orchestrator.submit(&file, None).await.is_none());
    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);

    let document = orchestrator
        .submit(&file, None)
        .await
        .expect("cached empty document");
    assert_eq!(document.total_pages, 0);
    assert!(document.pages.is_empty());

    // The probe rejected the bytes before the engine ever saw them
    assert_eq!(source.opens(), 0);
    assert_eq!(renderer.renders(), 0);
}

#[tokio::test]
async fn scenario_c_priority_pages_leaves_placeholders() {
    let source = MockDocumentSource::with_pages(30);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("medium.pdf", 5 * 1024 * 1024, 2);
    assert!(orchestrator.submit(&file, None).await.is_none());
    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);

    let document = orchestrator
        .submit(&file, None)
        .await
        .expect("cached document");
    assert_eq!(document.total_pages, 30);
    assert_eq!(document.pages.len(), 30);

    for page in &document.pages[..10] {
        assert!(
            page.thumbnail.as_ready().is_some(),
            "page {} should be rendered",
            page.page_number
        );
    }
    for page in &document.pages[10..] {
        assert!(
            page.thumbnail.is_pending(),
            "page {} should be a placeholder",
            page.page_number
        );
    }
    assert_eq!(renderer.renders(), 10);
}

#[tokio::test]
async fn scenario_d_second_submission_hits_cache_with_one_open() {
    let source = MockDocumentSource::with_pages(2);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("dedup.pdf", 100 * 1024, 3);
    assert!(orchestrator.submit(&file, None).await.is_none());
    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);

    let document = orchestrator.submit(&file, None).await;
    assert!(document.is_some());

    // The probe handle was reused by the executor: one open overall, and
    // the handle was released exactly once.
    assert_eq!(source.opens(), 1);
    assert_eq!(source.closes(), 1);

    let metrics = orchestrator.metrics();
    assert!(metrics.cache_hit_rate > 0.0);
}

#[tokio::test]
async fn duplicate_submissions_spawn_one_executor() {
    let source = MockDocumentSource::with_pages(3);
    let renderer = MockPageRenderer::with_delay(Duration::from_millis(50));
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("dup.pdf", 100 * 1024, 4);
    assert!(orchestrator.submit(&file, None).await.is_none());
    assert!(orchestrator.submit(&file, None).await.is_none());
    // retry does not bypass dedup while the run is still in flight
    assert!(orchestrator.retry(&file, None).await.is_none());

    assert!(wait_until(Duration::from_secs(3), || completed_in(&log)).await);

    assert_eq!(orchestrator.metrics().total_files, 1);
    assert_eq!(renderer.renders(), 3);
}

#[tokio::test]
async fn cancellation_yields_cancelled_and_closes_handle_once() {
    let source = MockDocumentSource::with_pages(5);
    let renderer = MockPageRenderer::with_delay(Duration::from_millis(150));
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("cancel.pdf", 100 * 1024, 5);
    let key = file_key(&file).await;
    assert!(orchestrator.submit(&file, None).await.is_none());

    // Wait until the run is demonstrably processing, then cancel it
    assert!(
        wait_until(Duration::from_secs(2), || {
            log.snapshot().iter().any(|event| {
                event
                    .state
                    .as_ref()
                    .is_some_and(|state| state.progress >= 10.0)
            })
        })
        .await
    );
    orchestrator.cancel(&key);

    assert!(
        wait_until(Duration::from_secs(2), || {
            terminal_status(&log) == Some(ProcessingStatus::Cancelled)
        })
        .await
    );
    // Never flips to completed afterwards
    assert!(!completed_in(&log));

    // The handle is released exactly once even though the run was aborted
    assert!(wait_until(Duration::from_secs(1), || source.closes() == 1).await);

    // No partial result was cached
    assert_eq!(orchestrator.cache_stats().entries, 0);
    assert!(orchestrator.submit(&file, None).await.is_none());
}

#[tokio::test]
async fn timeout_surfaces_as_timeout_error() {
    let source = MockDocumentSource::with_pages(3);
    let renderer = MockPageRenderer::with_delay(Duration::from_secs(30));
    let config = PipelineConfig {
        defaults: ProcessingConfig::default().with_timeout_ms(80),
        ..Default::default()
    };
    let orchestrator = orchestrator(&source, &renderer, config);
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("slow.pdf", 100 * 1024, 6);
    assert!(orchestrator.submit(&file, None).await.is_none());

    assert!(
        wait_until(Duration::from_secs(3), || {
            log.snapshot().iter().any(|event| {
                event.state.as_ref().is_some_and(|state| {
                    state.status == ProcessingStatus::Error
                        && state
                            .error
                            .as_ref()
                            .is_some_and(|error| error.kind == ErrorKind::Timeout)
                })
            })
        })
        .await
    );

    // Abandoning the in-flight render still released the handle
    assert!(wait_until(Duration::from_secs(1), || source.closes() == 1).await);
    assert_eq!(orchestrator.metrics().failed_files, 1);
}

#[tokio::test]
async fn retry_resubmits_after_terminal_error() {
    let source = MockDocumentSource::with_pages(2);
    let renderer = MockPageRenderer::failing(1);
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("flaky.pdf", 100 * 1024, 7);
    let overrides = ProcessingOverrides {
        max_retries: Some(0),
        ..Default::default()
    };
    assert!(orchestrator.submit(&file, Some(overrides)).await.is_none());

    assert!(
        wait_until(Duration::from_secs(2), || {
            terminal_status(&log) == Some(ProcessingStatus::Error)
        })
        .await
    );

    // The renderer has exhausted its scripted failure; a retry succeeds
    assert!(orchestrator.retry(&file, None).await.is_none());
    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);

    let metrics = orchestrator.metrics();
    assert_eq!(metrics.total_files, 2);
    assert_eq!(metrics.failed_files, 1);
    assert_eq!(metrics.completed_files, 1);
}

#[tokio::test]
async fn terminal_states_purge_after_grace_window() {
    let source = MockDocumentSource::with_pages(1);
    let renderer = MockPageRenderer::instant();
    let config = PipelineConfig {
        completed_grace: Duration::from_millis(50),
        ..Default::default()
    };
    let orchestrator = orchestrator(&source, &renderer, config);
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("purge.pdf", 10 * 1024, 8);
    assert!(orchestrator.submit(&file, None).await.is_none());
    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);

    // Entry is visible through the grace window, then purged with a final
    // removal event
    assert!(
        wait_until(Duration::from_secs(2), || {
            orchestrator.states().is_empty()
        })
        .await
    );
    assert!(log
        .snapshot()
        .iter()
        .any(|event| event.state.is_none()));

    // The cached result outlives the purged state
    assert!(orchestrator.submit(&file, None).await.is_some());
}

#[tokio::test]
async fn progress_is_monotonic_while_processing() {
    let source = MockDocumentSource::with_pages(8);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("progress.pdf", 100 * 1024, 9);
    assert!(orchestrator.submit(&file, None).await.is_none());
    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);

    let progress_values: Vec<f32> = log
        .snapshot()
        .iter()
        .filter_map(|event| event.state.as_ref())
        .map(|state| state.progress)
        .collect();
    assert!(progress_values.len() > 3);
    assert!(progress_values
        .windows(2)
        .all(|pair| pair[1] >= pair[0]));
}

#[tokio::test]
async fn unsubscribe_stops_events() {
    let source = MockDocumentSource::with_pages(1);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());

    let muted = EventLog::new();
    let subscription = muted.attach(&orchestrator);
    orchestrator.unsubscribe(subscription);

    let live = EventLog::new();
    live.attach(&orchestrator);

    let file = pdf_file("quiet.pdf", 10 * 1024, 10);
    assert!(orchestrator.submit(&file, None).await.is_none());
    assert!(wait_until(Duration::from_secs(2), || completed_in(&live)).await);

    assert_eq!(muted.len(), 0);
    assert!(live.len() > 0);
}

#[tokio::test]
async fn cleanup_cancels_in_flight_work_and_evicts_cache() {
    let source = MockDocumentSource::with_pages(2);
    let renderer = MockPageRenderer::with_delay(Duration::from_millis(100));
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    // One file processed to completion, one still in flight
    let done = pdf_file("done.pdf", 10 * 1024, 11);
    assert!(orchestrator.submit(&done, None).await.is_none());
    assert!(wait_until(Duration::from_secs(3), || completed_in(&log)).await);
    assert_eq!(orchestrator.cache_stats().entries, 1);

    let in_flight = pdf_file("inflight.pdf", 10 * 1024, 12);
    assert!(orchestrator.submit(&in_flight, None).await.is_none());

    orchestrator.cleanup(&[done.clone(), in_flight.clone()]).await;
    assert_eq!(orchestrator.cache_stats().entries, 0);
    assert!(orchestrator.states().is_empty());

    // Miss again after eviction: a fresh submission spawns a new run
    assert!(orchestrator.submit(&done, None).await.is_none());
}

#[tokio::test]
async fn clear_all_drops_state_and_cache() {
    let source = MockDocumentSource::with_pages(1);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("clear.pdf", 10 * 1024, 13);
    assert!(orchestrator.submit(&file, None).await.is_none());
    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);

    orchestrator.clear_all();
    assert!(orchestrator.states().is_empty());
    assert_eq!(orchestrator.cache_stats().entries, 0);
}

#[tokio::test]
async fn load_page_hydrates_exactly_one_slot() {
    let source = MockDocumentSource::with_pages(30);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("hydrate.pdf", 5 * 1024 * 1024, 14);
    assert!(orchestrator.submit(&file, None).await.is_none());
    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);

    let before = orchestrator.submit(&file, None).await.expect("cached");
    assert_eq!(before.placeholder_count(), 20);

    let thumbnail = orchestrator
        .load_page(&file, 15)
        .await
        .expect("hydration succeeds");
    assert!(thumbnail.is_some());

    let after = orchestrator.submit(&file, None).await.expect("cached");
    assert_eq!(after.placeholder_count(), 19);
    let page = after
        .pages
        .iter()
        .find(|page| page.page_number == 15)
        .expect("page 15");
    assert!(page.thumbnail.as_ready().is_some());

    // An already-rendered page is returned without another render
    let renders = renderer.renders();
    let again = orchestrator.load_page(&file, 15).await.expect("no-op");
    assert!(again.is_some());
    assert_eq!(renderer.renders(), renders);
}

#[tokio::test]
async fn load_page_without_cached_document_is_an_error() {
    let source = MockDocumentSource::with_pages(3);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());

    let file = pdf_file("nothing.pdf", 10 * 1024, 15);
    assert!(orchestrator.load_page(&file, 1).await.is_err());
}

#[tokio::test]
async fn corrupted_open_after_probe_completes_empty() {
    // Bytes pass the magic probe, but the engine rejects them on open with
    // a structured corruption code: non-recoverable, single attempt.
    let source = MockDocumentSource::failing(OpenFailure::Corrupted, u32::MAX, 0);
    let renderer = MockPageRenderer::instant();
    let orchestrator = orchestrator(&source, &renderer, PipelineConfig::default());
    let log = EventLog::new();
    log.attach(&orchestrator);

    let file = pdf_file("sneaky.pdf", 10 * 1024, 16);
    assert!(orchestrator.submit(&file, None).await.is_none());

    // Probe open failed → analysis says corrupted → metadata-only empty doc
    assert!(wait_until(Duration::from_secs(2), || completed_in(&log)).await);
    let document = orchestrator.submit(&file, None).await.expect("cached");
    assert_eq!(document.total_pages, 0);
    // Only the probe touched the engine
    assert_eq!(source.opens(), 1);
}
