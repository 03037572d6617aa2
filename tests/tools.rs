//! End-to-end tests against the real qpdf and ImageMagick (with Ghostscript).
//!
//! Fixtures are generated on the fly with the tools themselves. The tests
//! are gated behind `E2E_ENABLED` and skip when either tool is missing.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test tools -- --nocapture

use image::GenericImageView;
use pdf64::pipeline::encode::decode_data_uri;
use pdf64::pipeline::input::{DocumentBuilder, QpdfDocumentBuilder};
use pdf64::{ConversionOptions, ConversionRequest, Converter, ErrorKind, ServiceConfig};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const PASSWORD: &str = "secret123";

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Tools {
    qpdf: PathBuf,
    magick: PathBuf,
}

/// Skip this test unless E2E_ENABLED is set *and* both tools resolve.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run tool tests");
            return;
        }
        let qpdf = tool_locate::locate(&tool_locate::QPDF, None);
        let magick = tool_locate::locate(&tool_locate::IMAGEMAGICK, None);
        match (qpdf, magick) {
            (Ok(q), Ok(m)) => Tools {
                qpdf: q.path,
                magick: m.path,
            },
            (q, m) => {
                println!("SKIP: tools unavailable: qpdf {:?}, magick {:?}", q.err(), m.err());
                return;
            }
        }
    }};
}

/// Write an `n`-page PDF whose page `i` is a flat grey of level `20 * i`.
fn make_pdf(tools: &Tools, dir: &Path, pages: usize) -> PathBuf {
    let out = dir.join("fixture.pdf");
    let mut cmd = Command::new(&tools.magick);
    cmd.arg("-size").arg("120x80");
    for i in 0..pages {
        let v = 20 * i;
        cmd.arg(format!("xc:rgb({v},{v},{v})"));
    }
    cmd.arg(&out);
    let status = cmd.status().expect("run ImageMagick");
    assert!(status.success(), "fixture generation failed");
    out
}

fn encrypt(tools: &Tools, pdf: &Path) {
    let encrypted = pdf.with_extension("enc.pdf");
    let status = Command::new(&tools.qpdf)
        .args(["--encrypt", PASSWORD, PASSWORD, "256", "--"])
        .arg(pdf)
        .arg(&encrypted)
        .status()
        .expect("run qpdf");
    assert!(status.success(), "qpdf --encrypt failed");
    std::fs::rename(&encrypted, pdf).unwrap();
}

fn converter(tools: &Tools) -> Converter {
    Converter::from_config(&ServiceConfig {
        qpdf_path: Some(tools.qpdf.clone()),
        magick_path: Some(tools.magick.clone()),
        ..ServiceConfig::default()
    })
    .expect("tools resolve")
}

fn decode(uri: &str) -> image::DynamicImage {
    let decoded = decode_data_uri(uri).unwrap();
    image::load_from_memory(&decoded.bytes).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_page_defaults() {
    let tools = e2e_skip_unless_ready!();
    let dir = TempDir::new().unwrap();
    let pdf = make_pdf(&tools, dir.path(), 1);

    let result = converter(&tools)
        .execute(&ConversionRequest::new(&pdf), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.images.len(), 1);
    assert!(result.images[0].starts_with("data:image/jpeg;base64,"));
    let img = decode(&result.images[0]);
    assert!(img.width() > 0 && img.height() > 0);
}

#[tokio::test]
async fn test_twelve_pages_numeric_order() {
    let tools = e2e_skip_unless_ready!();
    let dir = TempDir::new().unwrap();
    let pdf = make_pdf(&tools, dir.path(), 12);
    let options = ConversionOptions::builder().resolution(72).build().unwrap();

    let result = converter(&tools)
        .execute(
            &ConversionRequest::new(&pdf).with_options(options),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.images.len(), 12);
    let levels: Vec<u8> = result
        .images
        .iter()
        .map(|uri| {
            let img = decode(uri);
            img.get_pixel(img.width() / 2, img.height() / 2)[0]
        })
        .collect();
    println!("page grey levels: {levels:?}");
    assert!(
        levels.windows(2).all(|w| w[0] < w[1]),
        "pages out of order: {levels:?}"
    );
}

#[tokio::test]
async fn test_merge_stacks_pages() {
    let tools = e2e_skip_unless_ready!();
    let dir = TempDir::new().unwrap();
    let pdf = make_pdf(&tools, dir.path(), 3);

    let single = ConversionOptions::builder().resolution(72).build().unwrap();
    let merged = ConversionOptions::builder()
        .resolution(72)
        .merge_pages(true)
        .build()
        .unwrap();
    let converter = converter(&tools);

    let pages = converter
        .execute(
            &ConversionRequest::new(&pdf).with_options(single),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let stacked = converter
        .execute(
            &ConversionRequest::new(&pdf).with_options(merged),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(stacked.images.len(), 1);
    let page_height = decode(&pages.images[0]).height();
    assert_eq!(decode(&stacked.images[0]).height(), page_height * 3);
}

#[tokio::test]
async fn test_probe_detects_encryption() {
    let tools = e2e_skip_unless_ready!();
    let dir = TempDir::new().unwrap();
    let pdf = make_pdf(&tools, dir.path(), 1);
    let builder = QpdfDocumentBuilder::new(&tools.qpdf);

    let plain = builder.build(&pdf, &CancellationToken::new()).await.unwrap();
    assert!(!plain.is_encrypted());

    encrypt(&tools, &pdf);
    let locked = builder.build(&pdf, &CancellationToken::new()).await.unwrap();
    assert!(locked.is_encrypted());
    assert_ne!(plain.id(), locked.id());
}

#[tokio::test]
async fn test_encrypted_with_password() {
    let tools = e2e_skip_unless_ready!();
    let dir = TempDir::new().unwrap();
    let pdf = make_pdf(&tools, dir.path(), 2);
    encrypt(&tools, &pdf);

    let result = converter(&tools)
        .execute(
            &ConversionRequest::new(&pdf).with_password(PASSWORD),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.images.len(), 2);
    let still_encrypted = Command::new(&tools.qpdf)
        .arg("--is-encrypted")
        .arg(&pdf)
        .status()
        .unwrap();
    assert_eq!(still_encrypted.code(), Some(2), "upload should now be decrypted");
}

#[tokio::test]
async fn test_encrypted_password_errors() {
    let tools = e2e_skip_unless_ready!();
    let dir = TempDir::new().unwrap();
    let pdf = make_pdf(&tools, dir.path(), 1);
    encrypt(&tools, &pdf);
    let converter = converter(&tools);

    let err = converter
        .execute(
            &ConversionRequest::new(&pdf).with_password(""),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PasswordRequired);

    let before = std::fs::read(&pdf).unwrap();
    let err = converter
        .execute(
            &ConversionRequest::new(&pdf).with_password("wrong"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    assert_eq!(std::fs::read(&pdf).unwrap(), before);
}
