//! # tool-locate
//!
//! Resolve the external executables pdf64 shells out to, exactly once, at
//! process startup. The resolved absolute path is then injected into the
//! capability that uses it, so nothing re-searches `PATH` per request.
//!
//! ## How it works
//!
//! For a [`ToolSpec`], [`locate`] tries, in order:
//!
//! 1. An explicit path passed by the caller (e.g. a `--qpdf` CLI flag).
//! 2. The tool's environment override (e.g. `PDF64_QPDF_PATH`).
//! 3. Each candidate name on `PATH`, first match wins
//!    (`magick` before `convert`, so ImageMagick 7 is preferred over 6).
//!
//! An explicit path or env override that does not point to an executable is an
//! error rather than a silent fallback: the operator asked for that binary.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tool_locate::{locate, IMAGEMAGICK, QPDF};
//!
//! let qpdf = locate(&QPDF, None).expect("qpdf not installed");
//! let magick = locate(&IMAGEMAGICK, None).expect("ImageMagick not installed");
//! println!("{} / {}", qpdf.path.display(), magick.path.display());
//! ```

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Known tools ──────────────────────────────────────────────────────────────

/// Description of an external tool and how to find it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// Human-readable tool name used in logs and errors.
    pub name: &'static str,
    /// Executable names searched on `PATH`, in preference order.
    pub candidates: &'static [&'static str],
    /// Environment variable that may hold an explicit executable path.
    pub env_override: &'static str,
}

/// qpdf, used for the encryption probe and for decryption.
pub const QPDF: ToolSpec = ToolSpec {
    name: "qpdf",
    candidates: &["qpdf"],
    env_override: "PDF64_QPDF_PATH",
};

/// ImageMagick, used for rasterisation. Version 7 ships `magick`; version 6
/// only ships `convert`.
pub const IMAGEMAGICK: ToolSpec = ToolSpec {
    name: "ImageMagick",
    candidates: &["magick", "convert"],
    env_override: "PDF64_MAGICK_PATH",
};

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tool resolution.
#[derive(Error, Debug)]
pub enum LocateError {
    /// None of the candidate names were found on the search path.
    #[error("{tool} not found on PATH (tried: {tried}); install it or set {env_override}")]
    NotFound {
        tool: &'static str,
        tried: String,
        env_override: &'static str,
    },

    /// An explicit or env-provided path does not point to an executable.
    #[error("{tool} path '{path}' (from {origin}) is not an executable file")]
    InvalidOverride {
        tool: &'static str,
        path: PathBuf,
        origin: Origin,
    },
}

// ── Resolution result ────────────────────────────────────────────────────────

/// Where a resolved path came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Passed in by the caller.
    Explicit,
    /// Read from the named environment variable.
    Env(&'static str),
    /// Found on the search path under this candidate name.
    SearchPath(&'static str),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Explicit => f.write_str("explicit path"),
            Origin::Env(var) => write!(f, "${var}"),
            Origin::SearchPath(name) => write!(f, "PATH lookup of '{name}'"),
        }
    }
}

/// A resolved executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub name: &'static str,
    pub path: PathBuf,
    pub origin: Origin,
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve `spec` against the process environment and `PATH`.
///
/// `explicit` takes precedence over everything else.
pub fn locate(spec: &ToolSpec, explicit: Option<&Path>) -> Result<ResolvedTool, LocateError> {
    let env_value = std::env::var_os(spec.env_override).filter(|v| !v.is_empty());
    let search_path = std::env::var_os("PATH");
    locate_with(spec, explicit, env_value.as_deref(), search_path.as_deref())
}

/// Resolve `spec` against the given search path only, ignoring the
/// environment override. Useful when the search path is not the process one.
pub fn locate_in(spec: &ToolSpec, search_path: &OsStr) -> Result<ResolvedTool, LocateError> {
    locate_with(spec, None, None, Some(search_path))
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn locate_with(
    spec: &ToolSpec,
    explicit: Option<&Path>,
    env_value: Option<&OsStr>,
    search_path: Option<&OsStr>,
) -> Result<ResolvedTool, LocateError> {
    // 1. Explicit path from the caller.
    if let Some(path) = explicit {
        return checked_override(spec, path, Origin::Explicit);
    }

    // 2. Environment variable override.
    if let Some(value) = env_value {
        return checked_override(spec, Path::new(value), Origin::Env(spec.env_override));
    }

    // 3. Candidate names on the search path.
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    for &candidate in spec.candidates {
        if let Ok(path) = which::which_in(candidate, search_path, &cwd) {
            return Ok(ResolvedTool {
                name: spec.name,
                path,
                origin: Origin::SearchPath(candidate),
            });
        }
    }

    Err(LocateError::NotFound {
        tool: spec.name,
        tried: spec.candidates.join(", "),
        env_override: spec.env_override,
    })
}

/// Validate a caller-supplied path. Bare names (no separator) are looked up on
/// `PATH` so `PDF64_MAGICK_PATH=convert` works as expected.
fn checked_override(
    spec: &ToolSpec,
    path: &Path,
    origin: Origin,
) -> Result<ResolvedTool, LocateError> {
    let invalid = || LocateError::InvalidOverride {
        tool: spec.name,
        path: path.to_path_buf(),
        origin: origin.clone(),
    };

    let resolved = if path.components().count() == 1 {
        which::which(path).map_err(|_| invalid())?
    } else {
        if !is_executable(path) {
            return Err(invalid());
        }
        path.to_path_buf()
    };

    Ok(ResolvedTool {
        name: spec.name,
        path: resolved,
        origin,
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
