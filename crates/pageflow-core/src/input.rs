//! In-memory input files

use std::sync::Arc;

/// An input file held in memory.
///
/// The byte buffer is reference-counted so a file can be handed to the
/// analyzer, the hasher, and a spawned executor task without copying.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Original file name, used for page ids and state snapshots
    pub name: String,

    /// Raw file content
    bytes: Arc<Vec<u8>>,
}

impl InputFile {
    /// Create an input file from a name and its content.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::new(bytes.into()),
        }
    }

    /// File size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Raw content.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
