//! Conversion output types.

use serde::{Deserialize, Serialize};

/// The result of one successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Identity of the converted document; unique per conversion.
    pub id: String,

    /// Data-URI images (`data:image/jpeg;base64,...`) in source page order.
    /// Exactly one element when pages were merged.
    pub images: Vec<String>,
}

impl ConversionResult {
    /// Number of images produced.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
