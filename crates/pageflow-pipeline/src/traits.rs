//! Capability traits for the embedded document engine
//!
//! The pipeline never parses or rasterizes anything itself: it consumes
//! these capabilities behind trait objects so the engine can be swapped and
//! the whole orchestration layer tested with scripted mocks. Everything is
//! async even where a given engine is synchronous, for interface uniformity
//! across suspension points.
//!
//! Capping the number of simultaneously open handles and queuing excess
//! requests is the engine collaborator's responsibility, not the pipeline's.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pageflow_core::{EngineError, InputFile, Thumbnail, ThumbnailQuality};

/// Opens documents from raw bytes.
///
/// Implementations must report open failures with the structured
/// [`EngineError`] codes (`Encrypted` for password-protected input,
/// `Corrupted` for unparseable input) rather than free-text messages, so
/// the analyzer can branch without sniffing strings.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Open a document and return a live handle to it.
    async fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, EngineError>;
}

/// A live, opened document.
#[async_trait]
pub trait DocumentHandle: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Whether the document is password-protected.
    fn is_encrypted(&self) -> bool;

    /// Fetch a handle to one page (1-based).
    async fn page(&self, page_number: u32) -> Result<Box<dyn PageHandle>, EngineError>;

    /// Release engine resources for this document.
    ///
    /// The pipeline calls this exactly once, on every exit path.
    fn close(&self);
}

/// A page within an open document.
pub trait PageHandle: Send + Sync {
    /// 1-based page number.
    fn page_number(&self) -> u32;
}

/// Rasterizes pages into thumbnails.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render a page at the given quality tier.
    ///
    /// `Ok(None)` means the render ran but produced no image (for example a
    /// blank page the engine elides); that is not an error.
    async fn render(
        &self,
        page: &dyn PageHandle,
        quality: ThumbnailQuality,
    ) -> Result<Option<Thumbnail>, EngineError>;
}

/// Produces a stable content fingerprint for a file.
///
/// The fingerprint keys the cache and the in-flight dedup map, so it must be
/// identical for identical byte content regardless of file name or wrapper
/// identity, and collision-resistant enough to dedupe re-uploads.
#[async_trait]
pub trait ContentHasher: Send + Sync {
    /// Fingerprint the file's content.
    async fn hash(&self, file: &InputFile) -> String;
}

/// Wall-clock source, injected for testability.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
