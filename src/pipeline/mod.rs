//! Pipeline capabilities for PDF-to-image conversion.
//!
//! Each submodule implements one step behind a trait, so the sequencing in
//! [`crate::convert::Converter`] can be exercised with fakes and each real
//! backend can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ decrypt ──▶ render ──▶ encode
//! (probe)   (qpdf)      (magick)   (data URI)
//! ```
//!
//! 1. [`input`], [`input::DocumentBuilder`]: header check and
//!    `qpdf --is-encrypted` probe
//! 2. [`decrypt`], [`decrypt::Decryptor`]: `qpdf --decrypt` into a sibling
//!    temp file, renamed over the original only on success
//! 3. [`render`], [`render::Rasterizer`]: ImageMagick into a private temp
//!    directory, pages ordered by numeric index
//! 4. [`encode`]: bytes → `data:<media-type>;base64,…` and back
//!
//! [`process`] is shared plumbing: every external call goes through it so
//! cancellation kills the whole process group.

pub mod decrypt;
pub mod encode;
pub mod input;
pub mod process;
pub mod render;
