use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A `(filename, byte-offset)` pair sufficient to re-read a record from its
/// source file. Bodies are never stored by value (see SPEC_FULL.md §3) —
/// every sequence body in memory is reconstructed on demand from one of
/// these.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// Path of the file the record was read from.
    pub file: String,
    /// Byte offset of the start of the header line (the `>`) within `file`.
    pub offset: u64,
}

impl Locator {
    /// Build a new locator.
    pub fn new(file: impl Into<String>, offset: u64) -> Self {
        Self {
            file: file.into(),
            offset,
        }
    }

    /// Encode as the byte-string value stored in a `Store`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a value previously produced by [`Locator::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
