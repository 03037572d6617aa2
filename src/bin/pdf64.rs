//! CLI binary for pdf64.
//!
//! `serve` runs the HTTP service, `convert` runs one conversion locally and
//! `tools` reports which qpdf and ImageMagick executables would be used.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdf64::pipeline::encode::decode_data_uri;
use pdf64::server::{self, AppState};
use pdf64::{
    ConversionOptions, ConversionProgressCallback, ConversionRequest, ConversionResult,
    Converter, ImageFormat, ServiceConfig, Step,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that names the running step and logs each finished one.
struct CliProgressCallback {
    bar: ProgressBar,
    started: std::sync::Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("pdf64");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: std::sync::Mutex::new(None),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|g| *g)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

fn step_label(step: Step) -> &'static str {
    match step {
        Step::Build => "Inspecting document",
        Step::Decrypt => "Removing password",
        Step::Rasterize => "Rendering pages",
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_step_start(&self, step: Step) {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("{}…", step_label(step)));
    }

    fn on_step_complete(&self, step: Step) {
        self.bar.println(format!(
            "  {} {:<20} {}",
            green("✓"),
            step_label(step),
            self.elapsed()
        ));
    }

    fn on_step_error(&self, step: Step, error: &str) {
        self.bar.println(format!(
            "  {} {:<20} {}",
            red("✗"),
            step_label(step),
            dim(error)
        ));
        self.bar.finish_and_clear();
    }

    fn on_conversion_complete(&self, id: &str, images: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} image(s)  {}", green("✔"), images, dim(id));
    }
}

// ── CLI arguments ────────────────────────────────────────────────────────────

/// Rasterise PDFs (password-protected ones included) into base64 data-URI images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf64",
    version,
    about = "Rasterise PDFs into base64 data-URI images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging.
    #[arg(short, long, global = true, env = "PDF64_VERBOSE")]
    verbose: bool,

    /// Only log errors; no progress output.
    #[arg(short, long, global = true, env = "PDF64_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (POST /v1/convert, GET /health).
    Serve(ServeArgs),
    /// Convert one local PDF.
    Convert(ConvertArgs),
    /// Show which qpdf and ImageMagick executables will be used.
    Tools(ToolArgs),
}

#[derive(Args, Debug)]
struct ToolArgs {
    /// qpdf executable (default: $PDF64_QPDF_PATH, then PATH).
    #[arg(long)]
    qpdf: Option<PathBuf>,

    /// ImageMagick executable (default: $PDF64_MAGICK_PATH, then magick/convert on PATH).
    #[arg(long)]
    magick: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "PDF64_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "PDF64_MAX_UPLOAD_MB", default_value_t = 32,
          value_parser = clap::value_parser!(u32).range(1..=4096))]
    max_upload_mb: u32,

    /// Per-conversion time limit in seconds (0 disables).
    #[arg(long, env = "PDF64_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    #[command(flatten)]
    tools: ToolArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// PDF file to convert. It is copied first and never modified.
    input: PathBuf,

    /// Password for encrypted PDFs.
    #[arg(long, env = "PDF64_PASSWORD")]
    password: Option<String>,

    /// Rendering density in DPI.
    #[arg(long, default_value_t = pdf64::config::DEFAULT_RESOLUTION,
          value_parser = clap::value_parser!(u32).range(36..=1200))]
    density: u32,

    /// Output quality (1–100).
    #[arg(long, default_value_t = pdf64::config::DEFAULT_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Stack all pages into one image.
    #[arg(long)]
    merge: bool,

    /// Output image format.
    #[arg(long, value_enum, default_value = "jpeg")]
    format: FormatArg,

    /// Write decoded images here instead of printing JSON.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print JSON ({"id", "images"}) to stdout, even with --output-dir.
    #[arg(long)]
    json: bool,

    /// Per-conversion time limit in seconds (0 disables).
    #[arg(long, default_value_t = 0)]
    timeout_secs: u64,

    #[command(flatten)]
    tools: ToolArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Jpeg,
    Png,
}

impl From<FormatArg> for ImageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpeg => ImageFormat::Jpeg,
            FormatArg::Png => ImageFormat::Png,
        }
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // A local conversion with a spinner keeps library logs at warn; the
    // spinner already reports each step.
    let spinner = !cli.quiet && matches!(&cli.command, Command::Convert(a) if !a.json);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if spinner {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Convert(args) => convert(args, spinner).await,
        Command::Tools(args) => tools(args),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = ServiceConfig {
        bind: args.bind,
        max_upload_bytes: (args.max_upload_mb as usize) << 20,
        request_timeout: timeout_from_secs(args.timeout_secs),
        qpdf_path: args.tools.qpdf,
        magick_path: args.tools.magick,
    };

    let converter = Converter::from_config(&config).context("Cannot start the service")?;
    let state = AppState::new(converter, &config);

    server::start_server(&config.bind, state, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down");
    })
    .await
    .with_context(|| format!("Server on {} failed", config.bind))
}

async fn convert(args: ConvertArgs, spinner: bool) -> Result<()> {
    let config = ServiceConfig {
        request_timeout: timeout_from_secs(args.timeout_secs),
        qpdf_path: args.tools.qpdf.clone(),
        magick_path: args.tools.magick.clone(),
        ..ServiceConfig::default()
    };

    let mut converter = Converter::from_config(&config)?;
    if spinner {
        converter = converter.with_progress(CliProgressCallback::new());
    }

    let options = ConversionOptions::builder()
        .resolution(args.density)
        .quality(args.quality)
        .merge_pages(args.merge)
        .format(args.format.into())
        .build()?;

    // Decryption rewrites its input in place; work on a private copy.
    let workdir = tempfile::Builder::new()
        .prefix("pdf64-cli-")
        .tempdir()
        .context("Failed to create a working directory")?;
    let copy = workdir.path().join("input.pdf");
    tokio::fs::copy(&args.input, &copy)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let mut request = ConversionRequest::new(&copy).with_options(options);
    request.password = args.password;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let result = converter
        .execute(&request, &cancel)
        .await
        .with_context(|| format!("Conversion of {} failed", args.input.display()))?;

    if let Some(ref dir) = args.output_dir {
        let written = write_images(&result, dir, args.merge).await?;
        if !args.json {
            eprintln!(
                "Wrote {} file(s) to {}",
                written,
                bold(&dir.display().to_string())
            );
        }
    }

    if args.json || args.output_dir.is_none() {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        println!("{json}");
    }

    Ok(())
}

/// Decode each data URI into `dir` as `page-N.<ext>` (1-based) or
/// `merged.<ext>`.
async fn write_images(result: &ConversionResult, dir: &Path, merged: bool) -> Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for (index, uri) in result.images.iter().enumerate() {
        let image = decode_data_uri(uri)?;
        let name = if merged {
            format!("merged.{}", image.extension())
        } else {
            format!("page-{}.{}", index + 1, image.extension())
        };
        let path = dir.join(name);
        tokio::fs::write(&path, &image.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(result.images.len())
}

fn tools(args: ToolArgs) -> Result<()> {
    let mut missing = 0;
    for (spec, explicit) in [
        (&tool_locate::QPDF, args.qpdf.as_deref()),
        (&tool_locate::IMAGEMAGICK, args.magick.as_deref()),
    ] {
        match tool_locate::locate(spec, explicit) {
            Ok(tool) => println!(
                "{} {:<12} {}  {}",
                green("✓"),
                tool.name,
                tool.path.display(),
                dim(&format!("({})", tool.origin))
            ),
            Err(e) => {
                missing += 1;
                println!("{} {:<12} {}", red("✗"), spec.name, e);
            }
        }
    }

    if missing > 0 {
        bail!("{missing} required tool(s) not found");
    }
    Ok(())
}
