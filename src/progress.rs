//! Progress-callback trait for per-step conversion events.
//!
//! Attach an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::convert::ConverterBuilder::progress_callback`] to observe a
//! conversion as it moves through build, decrypt and rasterize. The CLI uses
//! this to drive its spinner; the HTTP server does not attach one.
//!
//! # Example
//!
//! ```rust
//! use pdf64::{ConversionProgressCallback, Step};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct StepCounter(AtomicUsize);
//!
//! impl ConversionProgressCallback for StepCounter {
//!     fn on_step_complete(&self, _step: Step) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::Step;
use std::sync::Arc;

/// Called by the conversion pipeline as it moves through its steps.
///
/// All methods default to no-ops. Calls for one conversion are sequential,
/// but one callback may be shared by concurrent conversions, so shared
/// mutable state needs synchronisation.
pub trait ConversionProgressCallback: Send + Sync {
    /// A step is about to run.
    fn on_step_start(&self, step: Step) {
        let _ = step;
    }

    /// A step finished successfully.
    fn on_step_complete(&self, step: Step) {
        let _ = step;
    }

    /// The conversion failed or was cancelled during `step`.
    fn on_step_error(&self, step: Step, error: &str) {
        let _ = (step, error);
    }

    /// The conversion of document `id` produced `images` images.
    fn on_conversion_complete(&self, id: &str, images: usize) {
        let _ = (id, images);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type stored on [`crate::convert::Converter`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
