//! # pdf64
//!
//! Rasterise PDF uploads, password-protected ones included, into base64
//! `data:` URI images.
//!
//! ## Why shell out?
//!
//! Rendering PDFs faithfully (fonts, transparency groups, broken xref tables)
//! is what Ghostscript and qpdf have spent decades on. This crate keeps
//! them as external processes and concentrates on what wraps them: choosing
//! when to decrypt, isolating each request's files, killing the process tree
//! on cancellation, and returning pages in the right order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Build      allocate id, check %PDF- header, probe encryption (qpdf)
//!  ├─ 2. Decrypt    only if encrypted; qpdf --decrypt into a temp file, rename
//!  ├─ 3. Rasterize  ImageMagick → page-N files → numeric order → data URIs
//!  └─ 4. Assemble   { id, images }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf64::{ConversionRequest, Converter, ServiceConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::from_config(&ServiceConfig::default())?;
//!     let request = ConversionRequest::new("/tmp/upload/document.pdf").with_password("s3cret");
//!     let result = converter.execute(&request, &CancellationToken::new()).await?;
//!     println!("{}: {} image(s)", result.id, result.images.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | The axum HTTP transport in [`server`] |
//! | `cli`    | on      | The `pdf64` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Library-only use:
//! ```toml
//! pdf64 = { version = "0.3", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Tool | Used for | Override |
//! |------|----------|----------|
//! | `qpdf` | encryption probe, decryption | `PDF64_QPDF_PATH` |
//! | `magick` / `convert` | rasterisation (with Ghostscript) | `PDF64_MAGICK_PATH` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionOptions, ConversionOptionsBuilder, ImageFormat, ServiceConfig};
pub use convert::{ConversionRequest, Converter, ConverterBuilder};
pub use document::Document;
pub use error::{ErrorKind, Pdf64Error, Step};
pub use output::ConversionResult;
pub use pipeline::decrypt::Decryptor;
pub use pipeline::input::DocumentBuilder;
pub use pipeline::render::Rasterizer;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
