//! Error types for the pdf64 library.
//!
//! Every failure a conversion can hit is a variant of [`Pdf64Error`]. The
//! variants are deliberately specific (a wrong password and a corrupt upload
//! are different problems for the caller), and each one maps onto exactly one
//! member of the closed [`ErrorKind`] set. Transports (the HTTP server, the
//! CLI) switch on the kind to choose a status code; they never need to match
//! individual variants.
//!
//! The pipeline never downgrades a specific error into a generic one. Only the
//! transport may choose to *present* an [`ErrorKind::Internal`] failure
//! generically via [`Pdf64Error::client_message`], after logging the detail.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline step a failure or cancellation happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Building the [`crate::document::Document`] and probing encryption.
    Build,
    /// Removing password protection.
    Decrypt,
    /// Rendering pages to images.
    Rasterize,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Build => "build",
            Step::Decrypt => "decrypt",
            Step::Rasterize => "rasterize",
        })
    }
}

/// The closed set of failure kinds a conversion can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The source content could not be opened or is not a document.
    InputUnreadable,
    /// The content is encrypted and no password was supplied.
    PasswordRequired,
    /// A password was supplied but decryption failed.
    DecryptionFailed,
    /// Rasterisation failed or produced nothing.
    ConversionFailed,
    /// The caller's cancellation signal (or the timeout) fired.
    Cancelled,
    /// Configuration or working-area fault unrelated to the input.
    Internal,
}

/// All errors returned by the pdf64 library.
#[derive(Debug, Error)]
pub enum Pdf64Error {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded content could not be opened or read.
    #[error("Cannot read input '{path}': {reason}")]
    InputUnreadable { path: PathBuf, reason: String },

    /// The content was read but does not carry a PDF header.
    #[error("Input '{path}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    // ── Password errors ───────────────────────────────────────────────────
    /// The document is encrypted and no password was supplied.
    #[error("Document {id} is encrypted and requires a password")]
    PasswordRequired { id: String },

    /// qpdf rejected the password or could not rewrite the document.
    /// The original content is left untouched.
    #[error("Failed to decrypt document {id}: {detail}")]
    DecryptionFailed { id: String, detail: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The rasteriser exited non-zero; `detail` holds its captured stderr.
    #[error("Rasterisation of document {id} failed: {detail}")]
    ConversionFailed { id: String, detail: String },

    /// The rasteriser exited cleanly but wrote no page images.
    #[error("Rasterisation of document {id} produced no pages")]
    NoPagesProduced { id: String },

    // ── Tooling errors ────────────────────────────────────────────────────
    /// An external executable is missing or could not be started.
    #[error("{tool} is unavailable: {detail}")]
    ToolUnavailable { tool: String, step: Step, detail: String },

    // ── Cancellation ──────────────────────────────────────────────────────
    /// The cancellation token fired (or the timeout elapsed) during `step`.
    #[error("Conversion cancelled during {step}")]
    Cancelled { step: Step },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (working-area I/O, broken invariants).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf64Error {
    /// The [`ErrorKind`] this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Pdf64Error::InputUnreadable { .. } | Pdf64Error::NotAPdf { .. } => {
                ErrorKind::InputUnreadable
            }
            Pdf64Error::PasswordRequired { .. } => ErrorKind::PasswordRequired,
            Pdf64Error::DecryptionFailed { .. } => ErrorKind::DecryptionFailed,
            Pdf64Error::ConversionFailed { .. } | Pdf64Error::NoPagesProduced { .. } => {
                ErrorKind::ConversionFailed
            }
            // A missing tool fails the step it was needed for; the variant
            // itself stays distinct so operators can tell it from bad input.
            Pdf64Error::ToolUnavailable { step, .. } => match step {
                Step::Decrypt => ErrorKind::DecryptionFailed,
                Step::Build | Step::Rasterize => ErrorKind::ConversionFailed,
            },
            Pdf64Error::Cancelled { .. } => ErrorKind::Cancelled,
            Pdf64Error::InvalidConfig(_) | Pdf64Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// A message safe to send to a remote caller: no paths, no tool output.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Pdf64Error::InputUnreadable { .. } => "Failed to read uploaded file".to_string(),
            Pdf64Error::NotAPdf { .. } => "Uploaded file is not a PDF".to_string(),
            Pdf64Error::PasswordRequired { .. } => "PDF is password protected".to_string(),
            Pdf64Error::DecryptionFailed { .. } => {
                "Failed to decrypt PDF; check the password".to_string()
            }
            Pdf64Error::ConversionFailed { .. } => "Failed to convert PDF to images".to_string(),
            Pdf64Error::NoPagesProduced { .. } => "PDF produced no pages".to_string(),
            Pdf64Error::Cancelled { .. } => "Conversion cancelled".to_string(),
            Pdf64Error::ToolUnavailable { .. } => "Conversion tooling unavailable".to_string(),
            Pdf64Error::InvalidConfig(_) | Pdf64Error::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}
