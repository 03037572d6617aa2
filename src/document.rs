//! The per-request document record.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// An uploaded document for the lifetime of one conversion.
///
/// Holds the externally-visible id, where the bytes live, and whether the
/// content was encrypted when it was probed. `encrypted` only ever moves from
/// `true` to `false` (via [`Document::mark_decrypted`]); nothing sets it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: String,
    path: PathBuf,
    encrypted: bool,
}

impl Document {
    /// Create a record for content at `path` with a fresh identity.
    ///
    /// Ids are UUID v7: time-ordered with 74 random bits, generated without
    /// any process-wide counter, so concurrent requests never coordinate.
    pub fn new(path: impl Into<PathBuf>, encrypted: bool) -> Self {
        Self::with_id(Uuid::now_v7().to_string(), path, encrypted)
    }

    /// Create a record with an explicit id.
    pub fn with_id(id: impl Into<String>, path: impl Into<PathBuf>, encrypted: bool) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            encrypted,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Record that the content at [`Document::path`] has been replaced by an
    /// unencrypted equivalent.
    pub fn mark_decrypted(&mut self) {
        self.encrypted = false;
    }
}
