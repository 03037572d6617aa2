//! The conversion pipeline: build → (decrypt) → rasterize → assemble.
//!
//! [`Converter`] owns one implementation of each capability behind a trait
//! object, so the HTTP server, the CLI and the tests all drive the same
//! sequencing logic with different backends:
//!
//! ```text
//! location ──▶ DocumentBuilder ──▶ encrypted? ──yes──▶ Decryptor ──┐
//!                                      │ no                        │
//!                                      ▼                           ▼
//!                                  Rasterizer ◀────────────────────┘
//!                                      │
//!                                      ▼
//!                            ConversionResult { id, images }
//! ```
//!
//! A `Converter` is cheap to clone and safe to share across requests; it
//! holds no per-request state.

use crate::config::{ConversionOptions, ServiceConfig};
use crate::error::{Pdf64Error, Step};
use crate::output::ConversionResult;
use crate::pipeline::decrypt::{Decryptor, QpdfDecryptor};
use crate::pipeline::input::{DocumentBuilder, QpdfDocumentBuilder};
use crate::pipeline::render::{ImageMagickRasterizer, Rasterizer};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One conversion's input.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Where the PDF bytes live. Decryption rewrites this file in place, so
    /// it should be a request-private copy.
    pub location: PathBuf,

    /// Password for encrypted documents. `None` and `""` both mean "no
    /// password supplied".
    pub password: Option<String>,

    pub options: ConversionOptions,
}

impl ConversionRequest {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            password: None,
            options: ConversionOptions::default(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Runs the conversion pipeline over pluggable capabilities.
#[derive(Clone)]
pub struct Converter {
    builder: Arc<dyn DocumentBuilder>,
    decryptor: Arc<dyn Decryptor>,
    rasterizer: Arc<dyn Rasterizer>,
    timeout: Option<Duration>,
    progress: ProgressCallback,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Start building a converter from explicit capabilities.
    pub fn builder() -> ConverterBuilder {
        ConverterBuilder::default()
    }

    /// A converter backed by the qpdf and ImageMagick executables at the
    /// given paths.
    pub fn with_tools(qpdf: impl AsRef<Path>, magick: impl AsRef<Path>) -> Self {
        let qpdf = qpdf.as_ref();
        Self {
            builder: Arc::new(QpdfDocumentBuilder::new(qpdf)),
            decryptor: Arc::new(QpdfDecryptor::new(qpdf)),
            rasterizer: Arc::new(ImageMagickRasterizer::new(magick.as_ref())),
            timeout: None,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// Resolve qpdf and ImageMagick once (explicit path, then environment
    /// override, then `PATH`) and build a converter over them.
    ///
    /// Fails with [`Pdf64Error::ToolUnavailable`] when either tool is
    /// missing, so a service can refuse to start instead of failing every
    /// request.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, Pdf64Error> {
        let qpdf = tool_locate::locate(&tool_locate::QPDF, config.qpdf_path.as_deref())
            .map_err(|e| Pdf64Error::ToolUnavailable {
                tool: tool_locate::QPDF.name.to_string(),
                step: Step::Decrypt,
                detail: e.to_string(),
            })?;
        let magick = tool_locate::locate(&tool_locate::IMAGEMAGICK, config.magick_path.as_deref())
            .map_err(|e| Pdf64Error::ToolUnavailable {
                tool: tool_locate::IMAGEMAGICK.name.to_string(),
                step: Step::Rasterize,
                detail: e.to_string(),
            })?;

        info!("Using qpdf at {} ({})", qpdf.path.display(), qpdf.origin);
        info!(
            "Using ImageMagick at {} ({})",
            magick.path.display(),
            magick.origin
        );

        let mut converter = Self::with_tools(&qpdf.path, &magick.path);
        converter.timeout = config.request_timeout;
        Ok(converter)
    }

    /// Replace the per-conversion time limit.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Convert one document.
    ///
    /// Stops at the first failing step with that step's error. When `cancel`
    /// fires, or the configured timeout elapses, the running external process
    /// is killed and [`Pdf64Error::Cancelled`] names the interrupted step.
    pub async fn execute(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConversionResult, Pdf64Error> {
        let token = cancel.child_token();
        let run = self.run(request, &token);
        tokio::pin!(run);

        match self.timeout {
            None => run.await,
            Some(limit) => tokio::select! {
                result = &mut run => result,
                _ = tokio::time::sleep(limit) => {
                    warn!(
                        "Conversion of {} exceeded {}s; cancelling",
                        request.location.display(),
                        limit.as_secs_f32()
                    );
                    token.cancel();
                    run.await
                }
            },
        }
    }

    async fn run(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConversionResult, Pdf64Error> {
        let start = Instant::now();
        info!("Starting conversion: {}", request.location.display());

        // ── Step 1: Build ────────────────────────────────────────────────
        let mut document = self
            .step(Step::Build, cancel, self.builder.build(&request.location, cancel))
            .await?;

        // ── Step 2: Decrypt if needed ────────────────────────────────────
        if document.is_encrypted() {
            let password = request.password.as_deref().filter(|p| !p.is_empty());
            let Some(password) = password else {
                let err = Pdf64Error::PasswordRequired {
                    id: document.id().to_string(),
                };
                self.progress.on_step_start(Step::Decrypt);
                self.progress.on_step_error(Step::Decrypt, &err.to_string());
                return Err(err);
            };

            self.step(
                Step::Decrypt,
                cancel,
                self.decryptor.decrypt(&mut document, password, cancel),
            )
            .await?;

            if document.is_encrypted() {
                return Err(Pdf64Error::Internal(format!(
                    "decryptor reported success but document {} is still encrypted",
                    document.id()
                )));
            }
        } else {
            debug!("Document {} is not encrypted", document.id());
        }

        // ── Step 3: Rasterize ────────────────────────────────────────────
        let images = self
            .step(
                Step::Rasterize,
                cancel,
                self.rasterizer.rasterize(&document, &request.options, cancel),
            )
            .await?;

        // ── Step 4: Assemble ─────────────────────────────────────────────
        info!(
            "Conversion complete: document {}, {} image(s), {}ms total",
            document.id(),
            images.len(),
            start.elapsed().as_millis()
        );
        self.progress
            .on_conversion_complete(document.id(), images.len());

        Ok(ConversionResult {
            id: document.id().to_string(),
            images,
        })
    }

    /// Run one step, reporting it to the progress callback.
    async fn step<T>(
        &self,
        step: Step,
        cancel: &CancellationToken,
        work: impl Future<Output = Result<T, Pdf64Error>>,
    ) -> Result<T, Pdf64Error> {
        if cancel.is_cancelled() {
            let err = Pdf64Error::Cancelled { step };
            self.progress.on_step_error(step, &err.to_string());
            return Err(err);
        }

        self.progress.on_step_start(step);
        match work.await {
            Ok(value) => {
                self.progress.on_step_complete(step);
                Ok(value)
            }
            Err(err) => {
                debug!("Step {} failed: {}", step, err);
                self.progress.on_step_error(step, &err.to_string());
                Err(err)
            }
        }
    }
}

/// Builder for [`Converter`] with explicit capabilities.
///
/// Unset capabilities fall back to the executables named `qpdf` and `magick`
/// on `PATH`.
#[derive(Default)]
pub struct ConverterBuilder {
    builder: Option<Arc<dyn DocumentBuilder>>,
    decryptor: Option<Arc<dyn Decryptor>>,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    timeout: Option<Duration>,
    progress: Option<ProgressCallback>,
}

impl ConverterBuilder {
    pub fn document_builder(mut self, builder: Arc<dyn DocumentBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn decryptor(mut self, decryptor: Arc<dyn Decryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn progress_callback(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn build(self) -> Converter {
        let qpdf = tool_locate::QPDF.candidates[0];
        let magick = tool_locate::IMAGEMAGICK.candidates[0];
        Converter {
            builder: self
                .builder
                .unwrap_or_else(|| Arc::new(QpdfDocumentBuilder::new(qpdf))),
            decryptor: self
                .decryptor
                .unwrap_or_else(|| Arc::new(QpdfDecryptor::new(qpdf))),
            rasterizer: self
                .rasterizer
                .unwrap_or_else(|| Arc::new(ImageMagickRasterizer::new(magick))),
            timeout: self.timeout,
            progress: self
                .progress
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let req = ConversionRequest::new("/tmp/a.pdf");
        assert!(req.password.is_none());
        assert_eq!(req.options, ConversionOptions::default());

        let req = req.with_password("pw");
        assert_eq!(req.password.as_deref(), Some("pw"));
    }

    #[test]
    fn builder_defaults_have_no_timeout() {
        let converter = Converter::builder().build();
        assert!(converter.timeout().is_none());
        let converter = converter.with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(converter.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn from_config_reports_missing_tool() {
        let config = ServiceConfig {
            qpdf_path: Some("/nonexistent/pdf64/qpdf".into()),
            ..ServiceConfig::default()
        };
        let err = Converter::from_config(&config).unwrap_err();
        assert!(matches!(err, Pdf64Error::ToolUnavailable { step: Step::Decrypt, .. }));
    }
}
