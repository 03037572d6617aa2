//! Document building: turn a content location into a [`Document`].
//!
//! ## Why probe with qpdf instead of parsing the trailer ourselves?
//!
//! The `/Encrypt` entry can live in a cross-reference stream, an incremental
//! update, or a damaged trailer qpdf knows how to recover. qpdf is already a
//! hard dependency for decryption, so asking it keeps one source of truth
//! about what "encrypted" means.
//!
//! ## Inconclusive probes
//!
//! `qpdf --is-encrypted` exits 0 (encrypted) or 2 (not encrypted). Anything
//! else, including qpdf being absent, is treated as *not encrypted* with a
//! warning. A wrong guess surfaces as a rasterisation failure rather than
//! blocking every conversion on a broken probe.

use crate::document::Document;
use crate::error::{Pdf64Error, Step};
use crate::pipeline::process::{run_tool, RunError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How far into the content the `%PDF-` header may appear.
///
/// Acrobat tolerates leading junk (BOMs, mail headers) up to 1 KiB.
const HEADER_SEARCH_BYTES: u64 = 1024;

const PDF_HEADER: &[u8] = b"%PDF-";

/// Produces a [`Document`] from a content location.
#[async_trait]
pub trait DocumentBuilder: Send + Sync {
    /// Allocate an identity, verify the content is a readable PDF and probe
    /// whether it is encrypted. Never copies or moves the content.
    async fn build(
        &self,
        location: &Path,
        cancel: &CancellationToken,
    ) -> Result<Document, Pdf64Error>;
}

/// Outcome of `qpdf --is-encrypted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionProbe {
    Encrypted,
    NotEncrypted,
    /// The probe could not decide; carries qpdf's exit code if it had one.
    Inconclusive(Option<i32>),
}

impl EncryptionProbe {
    /// Map a `qpdf --is-encrypted` exit code.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => EncryptionProbe::Encrypted,
            Some(2) => EncryptionProbe::NotEncrypted,
            other => EncryptionProbe::Inconclusive(other),
        }
    }
}

/// [`DocumentBuilder`] backed by the `qpdf` executable.
#[derive(Debug, Clone)]
pub struct QpdfDocumentBuilder {
    qpdf: PathBuf,
}

impl QpdfDocumentBuilder {
    pub fn new(qpdf: impl Into<PathBuf>) -> Self {
        Self { qpdf: qpdf.into() }
    }

    async fn probe(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<EncryptionProbe, Pdf64Error> {
        let args: Vec<OsString> = vec!["--is-encrypted".into(), path.into()];
        match run_tool(&self.qpdf, &args, cancel).await {
            Ok(out) => {
                let probe = EncryptionProbe::from_exit_code(out.code());
                if let EncryptionProbe::Inconclusive(code) = probe {
                    warn!(
                        "Encryption probe inconclusive for {} (exit {:?}): {}",
                        path.display(),
                        code,
                        out.diagnostic()
                    );
                }
                Ok(probe)
            }
            Err(RunError::Cancelled) => Err(Pdf64Error::Cancelled { step: Step::Build }),
            Err(RunError::Spawn(e)) | Err(RunError::Wait(e)) => {
                warn!(
                    "Encryption probe could not run {}: {}; assuming not encrypted",
                    self.qpdf.display(),
                    e
                );
                Ok(EncryptionProbe::Inconclusive(None))
            }
        }
    }
}

#[async_trait]
impl DocumentBuilder for QpdfDocumentBuilder {
    async fn build(
        &self,
        location: &Path,
        cancel: &CancellationToken,
    ) -> Result<Document, Pdf64Error> {
        check_pdf_header(location).await?;

        let encrypted = match self.probe(location, cancel).await? {
            EncryptionProbe::Encrypted => true,
            EncryptionProbe::NotEncrypted | EncryptionProbe::Inconclusive(_) => false,
        };

        let document = Document::new(location, encrypted);
        debug!(
            "Built document {} from {} (encrypted: {})",
            document.id(),
            location.display(),
            encrypted
        );
        Ok(document)
    }
}

/// Verify `path` is readable and carries `%PDF-` within the first 1 KiB.
pub async fn check_pdf_header(path: &Path) -> Result<(), Pdf64Error> {
    let unreadable = |e: std::io::Error| Pdf64Error::InputUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let file = tokio::fs::File::open(path).await.map_err(unreadable)?;
    let mut head = Vec::with_capacity(HEADER_SEARCH_BYTES as usize);
    file.take(HEADER_SEARCH_BYTES)
        .read_to_end(&mut head)
        .await
        .map_err(unreadable)?;

    if head.windows(PDF_HEADER.len()).any(|w| w == PDF_HEADER) {
        Ok(())
    } else {
        Err(Pdf64Error::NotAPdf {
            path: path.to_path_buf(),
            magic: head.iter().take(8).copied().collect(),
        })
    }
}
