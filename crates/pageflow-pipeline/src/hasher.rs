//! Default content hasher

use crate::traits::ContentHasher;
use async_trait::async_trait;
use pageflow_core::InputFile;
use sha2::{Digest, Sha256};

/// SHA-256 content fingerprinter.
///
/// Hashes the file's bytes only, so re-uploads of identical content under
/// different names collapse to one cache entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256ContentHasher;

#[async_trait]
impl ContentHasher for Sha256ContentHasher {
    async fn hash(&self, file: &InputFile) -> String {
        let mut hasher = Sha256::new();
        hasher.update(file.bytes());
        format!("{:x}", hasher.finalize())
    }
}
