//! Error types for the ocr2text library.
//!
//! Two error types mirror the two places a run can go wrong:
//!
//! * [`OcrError`] — **Fatal**: the run is aborted (bad rule file, unsupported
//!   input, extractor failure, interrupted). Returned as `Err(OcrError)` from
//!   the top-level `convert*` functions.
//!
//! * [`PageError`] — a single page could not be recognised. It travels inside
//!   a [`crate::pipeline::PageResult`] from the worker that produced it to the
//!   reassembler, which turns the first one it reaches in page order into
//!   [`OcrError::Page`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr2text library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Rule errors ───────────────────────────────────────────────────────
    /// Rule text is syntactically malformed.
    #[error("rule definition in \"{label}\", line {line}: {message}")]
    RuleParse {
        label: String,
        line: usize,
        message: String,
    },

    /// Rule text parsed, but the rule itself cannot be built (empty match,
    /// invalid regular expression).
    #[error("rule definition in \"{label}\", line {line}: {message}")]
    RuleCompile {
        label: String,
        line: usize,
        message: String,
    },

    /// A rule file could not be read.
    #[error("Cannot read rule file '{path}': {source}")]
    RuleFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The input extension does not map to any page-image extractor.
    #[error("Unknown file type: '{path}'")]
    UnsupportedInputType { path: PathBuf },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The installed extractor lacks an option the pipeline depends on.
    #[error("Installed version of '{tool}' does not support '{option}' option")]
    ExtractorCapability { tool: String, option: String },

    /// The extractor ran and exited with a failure status.
    #[error("{message}")]
    ExtractorFailed { tool: String, message: String },

    /// An external tool could not be started at all.
    #[error("Failed to run '{tool}': {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Extraction succeeded but produced no page images.
    #[error("No images found in file '{path}'")]
    NoPageImages { path: PathBuf },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// OCR failed on a page; the run stops at the first failed page in page order.
    #[error(transparent)]
    Page(#[from] PageError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The temporary working directory could not be created or read.
    #[error("Working directory error: {source}")]
    WorkingDirectory {
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Control flow ──────────────────────────────────────────────────────
    /// The run was cancelled by an interrupt or termination signal.
    #[error("Interrupted")]
    Interrupted,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// An error for a single page.
///
/// `page` is the human-facing page number: the page's rank among the
/// extracted images plus the configured first page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The OCR engine exited with a failure status or could not be started.
    #[error("(page {page}) {detail}")]
    OcrFailed { page: usize, detail: String },
}

impl PageError {
    /// Human-facing page number of the failed page.
    pub fn page(&self) -> usize {
        match self {
            PageError::OcrFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_parse_display_carries_label_and_line() {
        let e = OcrError::RuleParse {
            label: "fix.rules".into(),
            line: 7,
            message: "Unknown rule scope: page".into(),
        };
        assert_eq!(
            e.to_string(),
            "rule definition in \"fix.rules\", line 7: Unknown rule scope: page"
        );
    }

    #[test]
    fn page_error_display_is_tagged() {
        let e = PageError::OcrFailed {
            page: 4,
            detail: "Error opening data file".into(),
        };
        assert_eq!(e.to_string(), "(page 4) Error opening data file");
        assert_eq!(e.page(), 4);
    }

    #[test]
    fn page_error_passes_through_transparently() {
        let e: OcrError = PageError::OcrFailed {
            page: 2,
            detail: "boom".into(),
        }
        .into();
        assert_eq!(e.to_string(), "(page 2) boom");
    }

    #[test]
    fn capability_display_names_option() {
        let e = OcrError::ExtractorCapability {
            tool: "pdfimages".into(),
            option: "-tiff".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pdfimages"), "got: {msg}");
        assert!(msg.contains("-tiff"), "got: {msg}");
    }

    #[test]
    fn unsupported_type_display() {
        let e = OcrError::UnsupportedInputType {
            path: PathBuf::from("doc.docx"),
        };
        assert!(e.to_string().contains("doc.docx"));
    }
}
