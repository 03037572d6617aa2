//! Password removal.
//!
//! qpdf writes the decrypted copy to a temporary file next to the original;
//! only a successful run renames it over the original. A wrong password, a
//! crash or a cancellation leaves the original bytes exactly as uploaded and
//! the temporary file is removed when its guard drops.

use crate::document::Document;
use crate::error::{Pdf64Error, Step};
use crate::pipeline::process::{run_tool, RunError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// qpdf exit status for "succeeded with warnings"; the output is usable.
const QPDF_EXIT_WARNINGS: i32 = 3;

/// Removes password protection from a [`Document`] in place.
#[async_trait]
pub trait Decryptor: Send + Sync {
    /// Replace the document's content with an unencrypted equivalent and
    /// clear its `encrypted` flag.
    ///
    /// On any error the flag stays set and the content is untouched.
    async fn decrypt(
        &self,
        document: &mut Document,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<(), Pdf64Error>;
}

/// [`Decryptor`] backed by `qpdf --decrypt`.
#[derive(Debug, Clone)]
pub struct QpdfDecryptor {
    qpdf: PathBuf,
}

impl QpdfDecryptor {
    pub fn new(qpdf: impl Into<PathBuf>) -> Self {
        Self { qpdf: qpdf.into() }
    }

    fn run_error(&self, err: RunError, id: &str) -> Pdf64Error {
        match err {
            RunError::Cancelled => Pdf64Error::Cancelled {
                step: Step::Decrypt,
            },
            RunError::Spawn(e) => Pdf64Error::ToolUnavailable {
                tool: self.qpdf.display().to_string(),
                step: Step::Decrypt,
                detail: e.to_string(),
            },
            RunError::Wait(e) => Pdf64Error::DecryptionFailed {
                id: id.to_string(),
                detail: format!("lost track of {}: {}", self.qpdf.display(), e),
            },
        }
    }
}

#[async_trait]
impl Decryptor for QpdfDecryptor {
    async fn decrypt(
        &self,
        document: &mut Document,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<(), Pdf64Error> {
        let dir = working_dir_of(document.path());
        let staged = tempfile::Builder::new()
            .prefix(".pdf64-decrypt-")
            .suffix(".pdf")
            .tempfile_in(dir)
            .map_err(|e| {
                Pdf64Error::Internal(format!(
                    "Cannot stage decrypted copy in {}: {}",
                    dir.display(),
                    e
                ))
            })?;

        let mut password_arg = OsString::from("--password=");
        password_arg.push(password);
        let args: Vec<OsString> = vec![
            "--decrypt".into(),
            password_arg,
            document.path().into(),
            staged.path().into(),
        ];

        debug!("Decrypting document {}", document.id());
        let out = run_tool(&self.qpdf, &args, cancel)
            .await
            .map_err(|e| self.run_error(e, document.id()))?;

        match out.code() {
            Some(0) | Some(QPDF_EXIT_WARNINGS) => {}
            _ => {
                return Err(Pdf64Error::DecryptionFailed {
                    id: document.id().to_string(),
                    detail: out.diagnostic(),
                })
            }
        }

        staged.persist(document.path()).map_err(|e| {
            Pdf64Error::Internal(format!(
                "Cannot replace {} with decrypted copy: {}",
                document.path().display(),
                e.error
            ))
        })?;
        document.mark_decrypted();

        info!(
            "Decrypted document {} in {}ms",
            document.id(),
            out.elapsed.as_millis()
        );
        Ok(())
    }
}

fn working_dir_of(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
