//! OCR engine invocation.
//!
//! [`OcrEngine`] is the seam between the worker pool and whatever recognises
//! a page image. The production implementation, [`Tesseract`], runs one
//! `tesseract IMAGE - -l LANG` subprocess per page and returns its stdout.
//!
//! The engine is invoked exactly once per page; there are no retries. When
//! the subprocess fails, only the first line of its stderr is kept: tesseract
//! follows the actual message with boilerplate that adds nothing.

use crate::config::OcrConfig;
use crate::error::PageError;
use crate::pipeline::PageRequest;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Recognises the text in a single page image.
pub trait OcrEngine: Send + Sync + 'static {
    /// Return the recognised text of `request.image`.
    ///
    /// `page_num` is the human-facing page number, used to tag errors.
    fn recognize(
        &self,
        request: &PageRequest,
        page_num: usize,
    ) -> impl Future<Output = Result<Vec<u8>, PageError>> + Send;
}

/// The `tesseract` command-line engine.
#[derive(Debug, Clone)]
pub struct Tesseract {
    program: PathBuf,
    language: String,
}

impl Tesseract {
    pub fn new(program: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(config.ocr_engine.clone(), config.language.clone())
    }
}

impl OcrEngine for Tesseract {
    async fn recognize(&self, request: &PageRequest, page_num: usize) -> Result<Vec<u8>, PageError> {
        debug!("Page {}: OCR {}", page_num, request.image.display());

        let output = Command::new(&self.program)
            .arg(&request.image)
            .arg("-")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PageError::OcrFailed {
                page: page_num,
                detail: format!("failed to run '{}': {}", self.program.display(), e),
            })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let detail = first_line(&output.stderr);
        Err(PageError::OcrFailed {
            page: page_num,
            detail: if detail.is_empty() {
                format!("'{}' exited with {}", self.program.display(), output.status)
            } else {
                detail
            },
        })
    }
}

/// First line of `bytes`, whitespace-trimmed.
fn first_line(bytes: &[u8]) -> String {
    let line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    String::from_utf8_lossy(line).trim().to_string()
}
