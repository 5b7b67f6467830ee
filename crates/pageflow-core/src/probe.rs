//! Cheap magic-byte document probe
//!
//! Run before any heavy open attempt so obviously non-document input never
//! reaches the engine. The PDF header may be preceded by up to 1024 bytes of
//! junk per the format's leniency rules, so the probe scans a window rather
//! than only byte zero.

/// Header scan window.
const PROBE_WINDOW: usize = 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Whether the bytes plausibly start a supported document.
#[must_use]
pub fn looks_like_document(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PROBE_WINDOW)];
    window
        .windows(PDF_MAGIC.len())
        .any(|candidate| candidate == PDF_MAGIC)
}
