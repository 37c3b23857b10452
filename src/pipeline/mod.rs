//! Pipeline stages for document-to-text conversion.
//!
//! Each submodule implements one step; [`crate::convert`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! workdir ──▶ extract ──▶ pool ──▶ reassemble
//! (TempDir)   (pdfimages/  (tesseract  (min-heap,
//!              ddjvu)       workers)    line filter)
//! ```
//!
//! 1. [`workdir`]    — a fresh temporary directory per run, removed on drop
//! 2. [`extract`]    — one TIFF per page via an external extractor chosen by
//!    file extension
//! 3. [`pool`]       — discover the page images and OCR them on a fixed pool of
//!    workers; results come back in completion order
//! 4. [`reassemble`] — restore page order and run the line filter into the
//!    output buffer

pub mod extract;
pub mod ocr;
pub mod pool;
pub mod reassemble;
pub mod workdir;

use crate::config::OcrConfig;
use crate::error::{OcrError, PageError};
use crate::rules::Filter;
use ocr::OcrEngine;
use reassemble::Reassembler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// One page image waiting for OCR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based rank of `image` among the sorted page images.
    pub sequence: usize,
    pub image: PathBuf,
}

/// The outcome of OCR on one [`PageRequest`].
#[derive(Debug, Clone)]
pub struct PageResult {
    pub request: PageRequest,
    /// Raw engine output, or the page's failure.
    pub text: Result<Vec<u8>, PageError>,
}

/// OCR every request on a worker pool and reassemble the line-filtered text
/// in page order.
///
/// On the first failed page (in page order) the pool is dropped, which aborts
/// the remaining workers and kills their engine processes, and that page's
/// error is returned.
pub async fn recognize_pages<E: OcrEngine>(
    engine: Arc<E>,
    requests: Vec<PageRequest>,
    config: &OcrConfig,
    line_filter: &Filter,
) -> Result<Vec<u8>, OcrError> {
    let total = requests.len();
    let (pool, results) = pool::spawn_workers(engine, requests, config)?;

    let mut reassembler = Reassembler::new(line_filter);
    reassembler.drain(results).await?;

    // The result stream only ends once every worker has dropped its sender;
    // joining here surfaces a worker that died instead of finishing.
    pool.join().await?;

    if reassembler.emitted() != total {
        return Err(OcrError::Internal(format!(
            "expected {} pages, reassembled {}",
            total,
            reassembler.emitted()
        )));
    }
    debug!("Reassembled {} pages", total);

    Ok(reassembler.finish())
}
