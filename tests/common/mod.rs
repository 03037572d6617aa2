//! Shared fakes and fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pdf64::pipeline::encode::to_data_uri;
use pdf64::{
    ConversionOptions, Converter, Decryptor, Document, DocumentBuilder, ImageFormat,
    Pdf64Error, Rasterizer, Step,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const PASSWORD: &str = "secret123";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Data URI a fake rasterizer returns for page `n`.
pub fn page_uri(n: usize) -> String {
    to_data_uri(format!("page {n}").as_bytes(), ImageFormat::Jpeg)
}

/// A minimal file with a PDF header. `PAGES=` and `ENCRYPTED` are read by
/// the fake tool scripts below.
pub fn pdf_fixture(dir: &Path, pages: usize, encrypted: bool) -> PathBuf {
    let path = dir.join("upload.pdf");
    let marker = if encrypted { "ENCRYPTED" } else { "PLAIN" };
    std::fs::write(&path, format!("%PDF-1.4\nPAGES={pages}\n{marker}\n%%EOF\n")).unwrap();
    path
}

// ── In-process fakes ─────────────────────────────────────────────────────────

pub struct FakeBuilder {
    pub encrypted: bool,
    pub calls: AtomicUsize,
    /// Every location handed to `build`, in call order.
    pub locations: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl DocumentBuilder for FakeBuilder {
    async fn build(
        &self,
        location: &Path,
        _cancel: &CancellationToken,
    ) -> Result<Document, Pdf64Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.locations.lock().unwrap().push(location.to_path_buf());
        if !location.exists() {
            return Err(Pdf64Error::InputUnreadable {
                path: location.to_path_buf(),
                reason: "not found".into(),
            });
        }
        Ok(Document::new(location, self.encrypted))
    }
}

pub struct FakeDecryptor {
    pub password: String,
    /// When false, reports success without clearing the flag.
    pub clears_flag: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Decryptor for FakeDecryptor {
    async fn decrypt(
        &self,
        document: &mut Document,
        password: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), Pdf64Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if password != self.password {
            return Err(Pdf64Error::DecryptionFailed {
                id: document.id().to_string(),
                detail: "invalid password".into(),
            });
        }
        if self.clears_flag {
            document.mark_decrypted();
        }
        Ok(())
    }
}

pub struct FakeRasterizer {
    pub pages: usize,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub saw_encrypted: AtomicBool,
    pub last_options: Mutex<Option<ConversionOptions>>,
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(
        &self,
        document: &Document,
        options: &ConversionOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, Pdf64Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if document.is_encrypted() {
            self.saw_encrypted.store(true, Ordering::SeqCst);
        }
        *self.last_options.lock().unwrap() = Some(*options);

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Pdf64Error::Cancelled { step: Step::Rasterize });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if self.pages == 0 {
            return Err(Pdf64Error::NoPagesProduced {
                id: document.id().to_string(),
            });
        }
        if options.merge_pages {
            return Ok(vec![to_data_uri(b"merged", options.format)]);
        }
        Ok((1..=self.pages).map(page_uri).collect())
    }
}

/// One of each fake, with handles kept for assertions.
pub struct Fakes {
    pub builder: Arc<FakeBuilder>,
    pub decryptor: Arc<FakeDecryptor>,
    pub rasterizer: Arc<FakeRasterizer>,
}

impl Fakes {
    pub fn new(encrypted: bool, pages: usize) -> Self {
        Self {
            builder: Arc::new(FakeBuilder {
                encrypted,
                calls: AtomicUsize::new(0),
                locations: Mutex::new(Vec::new()),
            }),
            decryptor: Arc::new(FakeDecryptor {
                password: PASSWORD.to_string(),
                clears_flag: true,
                calls: AtomicUsize::new(0),
            }),
            rasterizer: Arc::new(FakeRasterizer {
                pages,
                delay: None,
                calls: AtomicUsize::new(0),
                saw_encrypted: AtomicBool::new(false),
                last_options: Mutex::new(None),
            }),
        }
    }

    pub fn lying_decryptor(mut self) -> Self {
        self.decryptor = Arc::new(FakeDecryptor {
            password: PASSWORD.to_string(),
            clears_flag: false,
            calls: AtomicUsize::new(0),
        });
        self
    }

    pub fn slow_rasterizer(mut self, delay: Duration) -> Self {
        self.rasterizer = Arc::new(FakeRasterizer {
            pages: self.rasterizer.pages,
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            saw_encrypted: AtomicBool::new(false),
            last_options: Mutex::new(None),
        });
        self
    }

    pub fn converter(&self) -> Converter {
        Converter::builder()
            .document_builder(self.builder.clone())
            .decryptor(self.decryptor.clone())
            .rasterizer(self.rasterizer.clone())
            .build()
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decryptor.calls.load(Ordering::SeqCst)
    }

    pub fn rasterize_calls(&self) -> usize {
        self.rasterizer.calls.load(Ordering::SeqCst)
    }

    /// Directory holding the most recent upload the builder was given.
    pub fn last_upload_dir(&self) -> Option<PathBuf> {
        self.builder
            .locations
            .lock()
            .unwrap()
            .last()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
    }
}

// ── Fake external tools (Unix) ───────────────────────────────────────────────

/// Stand-in for qpdf: `ENCRYPTED` in the file means encrypted; only
/// `secret123` decrypts.
#[cfg(unix)]
pub const FAKE_QPDF: &str = r#"#!/bin/sh
case "$1" in
  --is-encrypted)
    if grep -q ENCRYPTED "$2"; then exit 0; else exit 2; fi ;;
  --decrypt)
    [ "$2" = "--password=secret123" ] || { echo "qpdf: invalid password" >&2; exit 2; }
    sed 's/ENCRYPTED/PLAIN/' "$3" > "$4" ;;
  *)
    exit 2 ;;
esac
"#;

/// Stand-in for ImageMagick: writes `PAGES=` page files (0-based, like
/// ImageMagick's `%d`) or one merged file, each holding `page <n>`.
#[cfg(unix)]
pub const FAKE_MAGICK: &str = r#"#!/bin/sh
for out; do :; done
in="${3#pdf:}"
if grep -q ENCRYPTED "$in"; then echo "gs: file requires a password" >&2; exit 1; fi
n=$(sed -n 's/^PAGES=//p' "$in")
dir=$(dirname "$out")
ext="${out##*.}"
case "$(basename "$out")" in
  merged.*) printf 'merged %s' "$n" > "$out" ;;
  *)
    i=0
    while [ "$i" -lt "$n" ]; do
      printf 'page %d' "$i" > "$dir/page-$i.$ext"
      i=$((i + 1))
    done ;;
esac
"#;

/// A magick that never finishes on its own.
#[cfg(unix)]
pub const HANGING_MAGICK: &str = "#!/bin/sh\nsleep 60\n";

#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.sync_all().unwrap();
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
