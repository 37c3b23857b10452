//! Result types returned by the conversion entry points.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The text of a converted document plus run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Filtered OCR text, one `\n`-terminated line per recognised line.
    ///
    /// Kept as bytes: the OCR engine's output is passed through unchanged
    /// and is not guaranteed to be UTF-8.
    pub text: Vec<u8>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// The text as a string, replacing invalid UTF-8 sequences.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }
}

/// Timing and size of one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Number of page images recognised.
    pub pages: usize,
    /// Wall-clock time spent in the extractor.
    pub extract_duration_ms: u64,
    /// Wall-clock time from the first OCR job to the last reassembled page.
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}
