//! Processed documents, pages, and thumbnail slots
//!
//! A [`ProcessedDocument`] is immutable once an executor produces it: the
//! cache owns it from then on, and later hydration of placeholder pages goes
//! through [`ProcessedDocument::with_hydrated_page`], which clones first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An encoded page thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    /// Pixel width
    pub width: u32,

    /// Pixel height
    pub height: u32,

    /// Encoded raster bytes (typically JPEG)
    pub data: Vec<u8>,
}

impl Thumbnail {
    /// Size of the encoded payload.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Materialization state of one page's thumbnail.
///
/// `Pending` marks a placeholder awaiting lazy hydration and is distinct
/// from `Empty`, which means the renderer ran and produced nothing. Only
/// `Pending` slots are eligible for hydration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailSlot {
    /// Placeholder: rendering deferred, awaiting hydration
    Pending,

    /// Rendered, but the renderer produced no image
    Empty,

    /// Rendered thumbnail
    Ready(Thumbnail),
}

impl ThumbnailSlot {
    /// Whether this slot still awaits hydration.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The rendered thumbnail, if any.
    #[must_use]
    pub const fn as_ready(&self) -> Option<&Thumbnail> {
        match self {
            Self::Ready(thumbnail) => Some(thumbnail),
            _ => None,
        }
    }

    /// Wrap a renderer result: an absent image becomes `Empty`.
    #[must_use]
    pub fn from_render(thumbnail: Option<Thumbnail>) -> Self {
        thumbnail.map_or(Self::Empty, Self::Ready)
    }
}

/// One page of a processed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    /// Stable page id, `"{file_name}-page-{n}"`
    pub id: String,

    /// 1-based page number
    pub page_number: u32,

    /// Thumbnail materialization state
    pub thumbnail: ThumbnailSlot,

    /// Rotation in degrees
    pub rotation: i32,

    /// Host-side selection flag
    pub selected: bool,
}

impl PageEntry {
    /// A page whose render already ran.
    #[must_use]
    pub fn rendered(file_name: &str, page_number: u32, thumbnail: Option<Thumbnail>) -> Self {
        Self {
            id: Self::page_id(file_name, page_number),
            page_number,
            thumbnail: ThumbnailSlot::from_render(thumbnail),
            rotation: 0,
            selected: false,
        }
    }

    /// A placeholder page awaiting hydration.
    #[must_use]
    pub fn placeholder(file_name: &str, page_number: u32) -> Self {
        Self {
            id: Self::page_id(file_name, page_number),
            page_number,
            thumbnail: ThumbnailSlot::Pending,
            rotation: 0,
            selected: false,
        }
    }

    fn page_id(file_name: &str, page_number: u32) -> String {
        format!("{file_name}-page-{page_number}")
    }
}

/// Document-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document title (the input file name)
    pub title: String,

    /// When this result was produced
    pub created_at: DateTime<Utc>,

    /// Last modification of this result (hydration updates this)
    pub modified_at: DateTime<Utc>,
}

/// A fully or partially materialized processing result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    /// Unique result id
    pub id: String,

    /// Pages in ascending page-number order
    pub pages: Vec<PageEntry>,

    /// Total page count reported by the engine
    pub total_pages: u32,

    /// Document metadata
    pub metadata: DocumentMetadata,
}

impl ProcessedDocument {
    /// Estimated in-memory footprint, used for cache budgeting.
    ///
    /// Counts encoded thumbnail payloads plus a fixed per-page overhead for
    /// ids and bookkeeping.
    #[must_use]
    pub fn estimated_size_bytes(&self) -> usize {
        const PER_PAGE_OVERHEAD: usize = 256;
        self.pages
            .iter()
            .map(|page| {
                PER_PAGE_OVERHEAD
                    + page
                        .thumbnail
                        .as_ready()
                        .map_or(0, Thumbnail::size_bytes)
            })
            .sum::<usize>()
            + self.metadata.title.len()
            + self.id.len()
    }

    /// Number of pages still awaiting hydration.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|page| page.thumbnail.is_pending())
            .count()
    }

    /// Clone this document with one page's slot replaced.
    ///
    /// Returns `None` when the page number is out of range. The original is
    /// left untouched; cached documents are immutable.
    #[must_use]
    pub fn with_hydrated_page(
        &self,
        page_number: u32,
        slot: ThumbnailSlot,
        modified_at: DateTime<Utc>,
    ) -> Option<Self> {
        let index = self
            .pages
            .iter()
            .position(|page| page.page_number == page_number)?;
        let mut updated = self.clone();
        updated.pages[index].thumbnail = slot;
        updated.metadata.modified_at = modified_at;
        Some(updated)
    }
}
