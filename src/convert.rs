//! Conversion entry points.
//!
//! Every entry point runs the same pipeline and differs only in what it is
//! given (rule files or compiled filters), what cancels it and where the
//! text ends up. Rules are compiled before anything is extracted, so a typo
//! in a rule file fails fast without starting a subprocess.
//!
//! The document is assembled in memory and the document filter runs once at
//! the end; nothing is written until the whole run has succeeded.

use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::extract::{self, InputKind};
use crate::pipeline::ocr::Tesseract;
use crate::pipeline::workdir::WorkDir;
use crate::pipeline::{self, pool};
use crate::rules::Filters;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF or DjVu document to text.
///
/// This is the primary entry point for the library. The rule files named in
/// `config.rule_files` are compiled first; an interrupt or terminate signal
/// stops the run with [`OcrError::Interrupted`].
///
/// # Errors
/// Any failure aborts the whole conversion: a bad rule file, an unsupported
/// or missing input, an extractor failure, or the first page (in page order)
/// the OCR engine could not recognise.
pub async fn convert(
    input: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<ConversionOutput, OcrError> {
    let filters = Filters::from_files(&config.rule_files).await?;
    convert_with_filters(input, config, &filters).await
}

/// Like [`convert`], with filters the caller already compiled.
/// `config.rule_files` is ignored.
pub async fn convert_with_filters(
    input: impl AsRef<Path>,
    config: &OcrConfig,
    filters: &Filters,
) -> Result<ConversionOutput, OcrError> {
    convert_with_cancel(input, config, filters, shutdown_signal()).await
}

/// Like [`convert_with_filters`], stopped by `cancel` instead of process
/// signals.
///
/// When `cancel` completes first, the running pipeline is dropped, which
/// kills any extractor or OCR subprocess still running, and the working
/// directory is removed before [`OcrError::Interrupted`] is returned.
pub async fn convert_with_cancel<C>(
    input: impl AsRef<Path>,
    config: &OcrConfig,
    filters: &Filters,
    cancel: C,
) -> Result<ConversionOutput, OcrError>
where
    C: Future<Output = ()>,
{
    let total_start = Instant::now();
    let input = input.as_ref();
    info!("Starting conversion: {}", input.display());

    let kind = InputKind::detect(input)?;
    if !input.is_file() {
        return Err(OcrError::FileNotFound {
            path: input.to_path_buf(),
        });
    }

    let workdir = WorkDir::create(config.temp_root.as_deref())?;

    let outcome = tokio::select! {
        biased;
        _ = cancel => {
            warn!("Conversion interrupted");
            Err(OcrError::Interrupted)
        }
        result = run_pipeline(input, kind, workdir.path(), config, filters) => result,
    };

    let closed = workdir.close();
    let (text, mut stats) = outcome?;
    closed?;

    let text = filters.apply_document(&text);
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Conversion complete: {} pages, {} bytes, {}ms total",
        stats.pages,
        text.len(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(stats.pages);
    }

    Ok(ConversionOutput { text, stats })
}

/// Convert a document and write the text directly to a file.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// partial file behind.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<ConversionStats, OcrError> {
    let output = convert(input, config).await?;
    write_atomic(output_path.as_ref(), &output.text).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<ConversionOutput, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Extract, OCR and reassemble. Returns the line-filtered text.
async fn run_pipeline(
    input: &Path,
    kind: InputKind,
    dir: &Path,
    config: &OcrConfig,
    filters: &Filters,
) -> Result<(Vec<u8>, ConversionStats), OcrError> {
    let extract_start = Instant::now();
    extract::extract_images(input, kind, dir, config).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    let requests = pool::discover_pages(dir, input)?;
    let pages = requests.len();
    info!(
        "Extracted {} pages in {}ms; OCR with {} workers",
        pages, extract_duration_ms, config.workers
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(pages);
    }

    let ocr_start = Instant::now();
    let engine = Arc::new(Tesseract::from_config(config));
    let text = pipeline::recognize_pages(engine, requests, config, &filters.line).await?;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
    debug!("OCR finished in {}ms", ocr_duration_ms);

    Ok((
        text,
        ConversionStats {
            pages,
            extract_duration_ms,
            ocr_duration_ms,
            total_duration_ms: 0,
        },
    ))
}

/// Write `data` to `path` via a sibling temp file and a rename.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), OcrError> {
    let write_failed = |e| OcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = match path.extension() {
        Some(ext) => path.with_extension(format!("{}.tmp", ext.to_string_lossy())),
        None => path.with_extension("tmp"),
    };
    tokio::fs::write(&tmp_path, data).await.map_err(write_failed)?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM on Unix.
///
/// A signal that cannot be listened for never fires.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for interrupt signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received interrupt signal"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
