//! Cancellable external-process invocation.
//!
//! Both capabilities are, at heart, one blocking call into an external
//! process tree (`qpdf`, or ImageMagick which in turn spawns Ghostscript).
//! [`run_tool`] wraps that call:
//!
//! - stdin and stdout are closed, stderr is captured for diagnostics;
//! - on Unix the child leads its own process group, so cancellation can kill
//!   the whole tree with one `killpg(SIGKILL)` instead of orphaning
//!   Ghostscript;
//! - the kill also happens when the future is dropped (client disconnect,
//!   timeout), through [`GroupGuard`] and tokio's `kill_on_drop`.

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Longest slice of stderr kept in error messages.
const MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// Captured result of a finished process.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Captured stderr as trimmed, length-capped text.
    pub fn diagnostic(&self) -> String {
        diagnostic(&self.stderr, &self.status)
    }
}

/// Why a process could not produce a [`ToolOutput`].
#[derive(Debug)]
pub enum RunError {
    /// The executable could not be started (missing, not executable).
    Spawn(std::io::Error),
    /// Waiting on the child failed.
    Wait(std::io::Error),
    /// The cancellation token fired; the process group was killed.
    Cancelled,
}

/// Run `program` with `args` to completion, or until `cancel` fires.
pub async fn run_tool(
    program: &Path,
    args: &[OsString],
    cancel: &CancellationToken,
) -> Result<ToolOutput, RunError> {
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    debug!("exec {} {:?}", program.display(), redacted(args));
    let start = Instant::now();
    let child = cmd.spawn().map_err(RunError::Spawn)?;
    let mut guard = GroupGuard::new(child.id());

    let waited = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("cancelled {} after {:?}", program.display(), start.elapsed());
            return Err(RunError::Cancelled);
        }
        out = child.wait_with_output() => out,
    };
    // The child has been reaped (or waiting on it failed); its pid may be
    // reused from here on.
    guard.disarm();
    let output = waited.map_err(RunError::Wait)?;

    let elapsed = start.elapsed();
    debug!(
        "{} exited with {} in {}ms",
        program.display(),
        output.status,
        elapsed.as_millis()
    );

    Ok(ToolOutput {
        status: output.status,
        stderr: output.stderr,
        elapsed,
    })
}

/// Arguments as loggable text, with password values masked.
fn redacted(args: &[OsString]) -> Vec<String> {
    args.iter()
        .map(|a| {
            let a = a.to_string_lossy();
            match a.split_once('=') {
                Some((flag, _)) if flag.starts_with("--password") => format!("{flag}=***"),
                _ => a.into_owned(),
            }
        })
        .collect()
}

fn diagnostic(stderr: &[u8], status: &ExitStatus) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return format!("exited with {status} and no diagnostic output");
    }
    if text.len() <= MAX_DIAGNOSTIC_BYTES {
        return text.to_string();
    }
    let mut cut = MAX_DIAGNOSTIC_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\u{2026}", &text[..cut])
}

/// Kills the child's process group on drop unless disarmed.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            // SAFETY: killpg has no memory-safety preconditions; a stale pgid
            // only yields ESRCH, which is ignored.
            unsafe {
                libc::killpg(pgid as libc::pid_t, libc::SIGKILL);
            }
        }
        #[cfg(not(unix))]
        let _ = self.pgid.take();
    }
}
