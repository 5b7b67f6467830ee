//! Scripted engine mocks shared by the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use pageflow_core::{EngineError, InputFile, Thumbnail, ThumbnailQuality};
use pageflow_pipeline::{
    ContentHasher, DocumentHandle, DocumentSource, PageHandle, PageRenderer, ProcessingOrchestrator,
    Sha256ContentHasher, StateEvent,
};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a scripted open attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure {
    Encrypted,
    Corrupted,
    Network,
}

impl OpenFailure {
    fn to_error(self) -> EngineError {
        match self {
            Self::Encrypted => EngineError::Encrypted,
            Self::Corrupted => EngineError::Corrupted("scripted corruption".into()),
            Self::Network => EngineError::Network("scripted connection reset".into()),
        }
    }
}

/// Scripted document engine.
pub struct MockDocumentSource {
    pages: u32,
    encrypted: bool,
    failure: Option<OpenFailure>,
    /// Opens left that fail before the source starts succeeding;
    /// `u32::MAX` means every open fails.
    failures_remaining: AtomicU32,
    pub open_count: AtomicUsize,
    pub close_count: Arc<AtomicUsize>,
}

impl MockDocumentSource {
    pub fn with_pages(pages: u32) -> Arc<Self> {
        Arc::new(Self {
            pages,
            encrypted: false,
            failure: None,
            failures_remaining: AtomicU32::new(0),
            open_count: AtomicUsize::new(0),
            close_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn failing(failure: OpenFailure, times: u32, pages_after: u32) -> Arc<Self> {
        Arc::new(Self {
            pages: pages_after,
            encrypted: false,
            failure: Some(failure),
            failures_remaining: AtomicU32::new(times),
            open_count: AtomicUsize::new(0),
            close_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn encrypted() -> Arc<Self> {
        Arc::new(Self {
            pages: 0,
            encrypted: true,
            failure: Some(OpenFailure::Encrypted),
            failures_remaining: AtomicU32::new(u32::MAX),
            open_count: AtomicUsize::new(0),
            close_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn opens(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for MockDocumentSource {
    async fn open(&self, _bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, EngineError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failure {
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                if remaining != u32::MAX {
                    self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                }
                return Err(failure.to_error());
            }
        }
        Ok(Box::new(MockHandle {
            pages: self.pages,
            encrypted: self.encrypted,
            close_count: Arc::clone(&self.close_count),
        }))
    }
}

struct MockHandle {
    pages: u32,
    encrypted: bool,
    close_count: Arc<AtomicUsize>,
}

#[async_trait]
impl DocumentHandle for MockHandle {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    async fn page(&self, page_number: u32) -> Result<Box<dyn PageHandle>, EngineError> {
        if page_number == 0 || page_number > self.pages {
            return Err(EngineError::Render(format!(
                "page {page_number} out of range"
            )));
        }
        Ok(Box::new(MockPage { page_number }))
    }

    fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockPage {
    page_number: u32,
}

impl PageHandle for MockPage {
    fn page_number(&self) -> u32 {
        self.page_number
    }
}

/// Scripted renderer.
pub struct MockPageRenderer {
    delay: Duration,
    /// Renders left that fail before the renderer starts succeeding.
    failures_remaining: AtomicU32,
    /// Pages that render to no image.
    blank_pages: Vec<u32>,
    pub render_count: AtomicUsize,
}

impl MockPageRenderer {
    pub fn instant() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            failures_remaining: AtomicU32::new(0),
            blank_pages: Vec::new(),
            render_count: AtomicUsize::new(0),
        })
    }

    pub fn failing(times: u32) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::ZERO,
            failures_remaining: AtomicU32::new(times),
            blank_pages: Vec::new(),
            render_count: AtomicUsize::new(0),
        })
    }

    pub fn renders(&self) -> usize {
        self.render_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for MockPageRenderer {
    async fn render(
        &self,
        page: &dyn PageHandle,
        _quality: ThumbnailQuality,
    ) -> Result<Option<Thumbnail>, EngineError> {
        self.render_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failures_remaining.load(Ordering::SeqCst) > 0 {
            self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(EngineError::Network("scripted render failure".into()));
        }
        if self.blank_pages.contains(&page.page_number()) {
            return Ok(None);
        }
        Ok(Some(Thumbnail {
            width: 64,
            height: 80,
            data: vec![page.page_number() as u8; 32],
        }))
    }
}

/// A file whose bytes pass the magic-byte probe.
pub fn pdf_file(name: &str, size: usize, seed: u8) -> InputFile {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.push(seed);
    bytes.resize(size.max(bytes.len()), 0x20);
    InputFile::new(name, bytes)
}

/// A file the probe rejects.
pub fn garbage_file(name: &str) -> InputFile {
    InputFile::new(name, b"this is not a document at all".to_vec())
}

/// The fingerprint the default hasher assigns to a file.
pub async fn file_key(file: &InputFile) -> String {
    Sha256ContentHasher.hash(file).await
}

/// Event recorder for subscriptions.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<StateEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, orchestrator: &ProcessingOrchestrator) -> pageflow_pipeline::SubscriptionId {
        let events = Arc::clone(&self.events);
        orchestrator.subscribe(move |event| {
            events.lock().unwrap().push(event.clone());
        })
    }

    pub fn snapshot(&self) -> Vec<StateEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

/// Poll until `condition` holds or the deadline passes.
pub async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
