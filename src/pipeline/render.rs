//! PDF rasterisation: render every page to an image via ImageMagick.
//!
//! ## Why a private temp directory per call?
//!
//! ImageMagick writes one file per page (`page-0.jpg`, `page-1.jpg`, …) and
//! the only way to learn how many it wrote is to list the directory. A
//! `TempDir` owned by this call makes that listing unambiguous under
//! concurrent requests, and its `Drop` removes every page file on success,
//! failure and cancellation alike.
//!
//! ## Why sort numerically?
//!
//! ImageMagick numbers scenes with `%d` and no padding. A lexical sort puts
//! `page-10` before `page-2`; the page index is parsed out of the name and
//! compared as an integer instead.

use crate::config::ConversionOptions;
use crate::document::Document;
use crate::error::{Pdf64Error, Step};
use crate::pipeline::encode;
use crate::pipeline::process::{run_tool, RunError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

static PAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page-(\d+)\.([A-Za-z0-9]+)$").unwrap());

/// Renders a [`Document`]'s pages to data-URI images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render all pages in source order, or a single vertically merged image
    /// when `options.merge_pages` is set.
    ///
    /// The caller guarantees `document` is not encrypted.
    async fn rasterize(
        &self,
        document: &Document,
        options: &ConversionOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, Pdf64Error>;
}

/// [`Rasterizer`] backed by ImageMagick (`magick`, or legacy `convert`).
#[derive(Debug, Clone)]
pub struct ImageMagickRasterizer {
    magick: PathBuf,
}

impl ImageMagickRasterizer {
    pub fn new(magick: impl Into<PathBuf>) -> Self {
        Self {
            magick: magick.into(),
        }
    }

    /// Only a failed spawn means the tool is missing; a failed wait is a
    /// broken conversion.
    fn run_error(&self, err: RunError, id: &str) -> Pdf64Error {
        match err {
            RunError::Cancelled => Pdf64Error::Cancelled {
                step: Step::Rasterize,
            },
            RunError::Spawn(e) => Pdf64Error::ToolUnavailable {
                tool: self.magick.display().to_string(),
                step: Step::Rasterize,
                detail: e.to_string(),
            },
            RunError::Wait(e) => Pdf64Error::ConversionFailed {
                id: id.to_string(),
                detail: format!("lost track of {}: {}", self.magick.display(), e),
            },
        }
    }
}

#[async_trait]
impl Rasterizer for ImageMagickRasterizer {
    async fn rasterize(
        &self,
        document: &Document,
        options: &ConversionOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, Pdf64Error> {
        let workdir = tempfile::Builder::new()
            .prefix("pdf64-raster-")
            .tempdir()
            .map_err(|e| Pdf64Error::Internal(format!("Cannot create render directory: {e}")))?;

        let ext = options.format.extension();
        let target = if options.merge_pages {
            workdir.path().join(format!("merged.{ext}"))
        } else {
            workdir.path().join(format!("page-%d.{ext}"))
        };
        let args = magick_args(document.path(), &target, options);

        let out = run_tool(&self.magick, &args, cancel)
            .await
            .map_err(|e| self.run_error(e, document.id()))?;

        if !out.status.success() {
            return Err(Pdf64Error::ConversionFailed {
                id: document.id().to_string(),
                detail: out.diagnostic(),
            });
        }

        let files = if options.merge_pages {
            if !target.is_file() {
                return Err(Pdf64Error::ConversionFailed {
                    id: document.id().to_string(),
                    detail: "merged output was not written".to_string(),
                });
            }
            vec![target]
        } else {
            page_files(&workdir, ext).await?
        };

        if files.is_empty() {
            return Err(Pdf64Error::NoPagesProduced {
                id: document.id().to_string(),
            });
        }

        let mut images = Vec::with_capacity(files.len());
        for file in &files {
            if cancel.is_cancelled() {
                return Err(Pdf64Error::Cancelled {
                    step: Step::Rasterize,
                });
            }
            let bytes = tokio::fs::read(file).await.map_err(|e| {
                Pdf64Error::Internal(format!("Cannot read {}: {}", file.display(), e))
            })?;
            images.push(encode::to_data_uri(&bytes, options.format));
        }

        info!(
            "Rasterised document {} → {} image(s) at {} DPI in {}ms",
            document.id(),
            images.len(),
            options.resolution,
            out.elapsed.as_millis()
        );
        Ok(images)
    }
}

/// ImageMagick argument list.
///
/// `-density` must precede the input so Ghostscript renders at that DPI.
/// The `pdf:` prefix pins the decoder regardless of file name, and
/// `-alpha remove` over white keeps transparent pages from turning black
/// in JPEG.
pub fn magick_args(input: &Path, target: &Path, options: &ConversionOptions) -> Vec<OsString> {
    let mut source = OsString::from("pdf:");
    source.push(input);

    let mut args: Vec<OsString> = vec![
        "-density".into(),
        options.resolution.to_string().into(),
        source,
        "-background".into(),
        "white".into(),
        "-alpha".into(),
        "remove".into(),
        "-quality".into(),
        options.quality.to_string().into(),
    ];
    if options.merge_pages {
        args.push("-append".into());
    }
    args.push(target.into());
    args
}

/// Page files in `dir` with extension `ext`, ordered by page index.
async fn page_files(dir: &TempDir, ext: &str) -> Result<Vec<PathBuf>, Pdf64Error> {
    let io_err = |e: std::io::Error| Pdf64Error::Internal(format!("Cannot list render output: {e}"));

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir.path()).await.map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    let ordered = order_pages(&names, ext);
    debug!("Found {} page file(s) in {}", ordered.len(), dir.path().display());
    Ok(ordered.into_iter().map(|n| dir.path().join(n)).collect())
}

/// Filter `names` down to `page-<n>.<ext>` and sort by `n` as an integer.
pub fn order_pages<'a>(names: &'a [String], ext: &str) -> Vec<&'a str> {
    let mut pages: Vec<(u64, &str)> = names
        .iter()
        .filter_map(|name| {
            let caps = PAGE_FILE.captures(name)?;
            if !caps[2].eq_ignore_ascii_case(ext) {
                return None;
            }
            let index = caps[1].parse::<u64>().ok()?;
            Some((index, name.as_str()))
        })
        .collect();
    pages.sort_by_key(|(index, _)| *index);
    pages.into_iter().map(|(_, name)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageFormat;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn twelve_pages_sort_numerically() {
        let mut list: Vec<String> = (0..12).map(|i| format!("page-{i}.jpg")).collect();
        list.sort(); // lexical, as a directory listing might return them
        assert_eq!(list[2], "page-10.jpg");

        let ordered = order_pages(&list, "jpg");
        let expected: Vec<String> = (0..12).map(|i| format!("page-{i}.jpg")).collect();
        assert_eq!(ordered, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let list = names(&["merged.jpg", "page-1.png", "page-x.jpg", "page-0.jpg", ".hidden"]);
        assert_eq!(order_pages(&list, "jpg"), vec!["page-0.jpg"]);
        assert_eq!(order_pages(&list, "png"), vec!["page-1.png"]);
    }

    #[test]
    fn args_for_pages() {
        let options = ConversionOptions::default();
        let args = magick_args(Path::new("/w/in.pdf"), Path::new("/t/page-%d.jpg"), &options);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-density", "300", "pdf:/w/in.pdf", "-background", "white", "-alpha", "remove",
                "-quality", "90", "/t/page-%d.jpg",
            ]
        );
    }

    #[test]
    fn args_for_merge() {
        let options = ConversionOptions::builder()
            .resolution(150)
            .quality(70)
            .merge_pages(true)
            .format(ImageFormat::Png)
            .build()
            .unwrap();
        let args = magick_args(Path::new("in.pdf"), Path::new("merged.png"), &options);
        let tail: Vec<String> = args[args.len() - 2..]
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(tail, vec!["-append", "merged.png"]);
        assert_eq!(args[1], OsString::from("150"));
    }

    #[test]
    fn wait_failure_is_a_conversion_failure() {
        let rasterizer = ImageMagickRasterizer::new("magick");
        let err = rasterizer.run_error(
            RunError::Wait(std::io::Error::other("waitpid interrupted")),
            "doc-1",
        );
        assert!(matches!(err, Pdf64Error::ConversionFailed { ref id, .. } if id == "doc-1"));
        assert_eq!(err.kind(), crate::error::ErrorKind::ConversionFailed);

        let err = rasterizer.run_error(RunError::Spawn(std::io::ErrorKind::NotFound.into()), "doc-1");
        assert!(matches!(err, Pdf64Error::ToolUnavailable { .. }));
    }

    #[tokio::test]
    async fn missing_tool_is_distinct_from_bad_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, "%PDF-1.4\n").unwrap();
        let doc = Document::new(path, false);

        let err = ImageMagickRasterizer::new("/nonexistent/magick")
            .rasterize(&doc, &ConversionOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Pdf64Error::ToolUnavailable {
                step: Step::Rasterize,
                ..
            }
        ));
    }
}
