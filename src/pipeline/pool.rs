//! Page discovery and the OCR worker pool.
//!
//! ## Channels
//!
//! ```text
//!   requests (capacity = pages)        results (capacity = workers)
//! ┌──────────┐      ┌──────────┐      ┌──────────────┐
//! │ prefilled│ ───▶ │ worker×W │ ───▶ │ reassembler  │
//! │ & closed │      └──────────┘      └──────────────┘
//! └──────────┘
//! ```
//!
//! The request queue is filled with every page up front and closed, so a
//! worker exits as soon as it finds the queue empty. The result channel holds
//! at most `W` finished pages; beyond that a worker waits on `send` until the
//! reassembler catches up. Each worker owns one result sender, so the result
//! stream ends exactly when the last worker has exited.
//!
//! Workers live in a [`JoinSet`] inside [`WorkerPool`]. Dropping the pool
//! aborts any worker still running, and the engine subprocess it was awaiting
//! is killed with it.

use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::{PageRequest, PageResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

/// Glob pattern of page images inside the working directory.
const PAGE_IMAGE_GLOB: &str = "*.tif";

/// List the page images in `dir` as requests, numbered by lexical order.
///
/// `input` only names the source document in the error when nothing was found.
pub fn discover_pages(dir: &Path, input: &Path) -> Result<Vec<PageRequest>, OcrError> {
    let dir_str = dir.to_str().ok_or_else(|| {
        OcrError::Internal(format!("non UTF-8 working directory: {}", dir.display()))
    })?;
    let pattern = format!("{}/{}", glob::Pattern::escape(dir_str), PAGE_IMAGE_GLOB);

    let entries = glob::glob(&pattern)
        .map_err(|e| OcrError::Internal(format!("bad page glob: {e}")))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| OcrError::WorkingDirectory {
            source: e.into(),
        })?;
        images.push(path);
    }

    if images.is_empty() {
        return Err(OcrError::NoPageImages {
            path: input.to_path_buf(),
        });
    }

    images.sort();
    info!("Found {} page images", images.len());

    Ok(images
        .into_iter()
        .enumerate()
        .map(|(sequence, image)| PageRequest { sequence, image })
        .collect())
}

/// Handle to the running workers.
pub struct WorkerPool {
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Wait for every worker to exit. A worker that panicked is reported as
    /// an internal error.
    pub async fn join(mut self) -> Result<(), OcrError> {
        while let Some(joined) = self.workers.join_next().await {
            joined.map_err(|e| OcrError::Internal(format!("OCR worker failed: {e}")))?;
        }
        Ok(())
    }
}

/// Start `config.workers` workers over `requests`.
///
/// Returns the pool handle and the stream of results in completion order.
pub fn spawn_workers<E: OcrEngine>(
    engine: Arc<E>,
    requests: Vec<PageRequest>,
    config: &OcrConfig,
) -> Result<(WorkerPool, ReceiverStream<PageResult>), OcrError> {
    let total = requests.len();
    let worker_count = config.workers.max(1);

    let (request_tx, request_rx) = mpsc::channel(total.max(1));
    for request in requests {
        request_tx
            .try_send(request)
            .map_err(|e| OcrError::Internal(format!("request queue rejected a page: {e}")))?;
    }
    drop(request_tx);
    let queue = Arc::new(Mutex::new(request_rx));

    let (result_tx, result_rx) = mpsc::channel(worker_count);
    let mut workers = JoinSet::new();
    let shared = Arc::new(config.clone());

    debug!("Starting {} OCR workers for {} pages", worker_count, total);
    for _ in 0..worker_count {
        workers.spawn(worker(
            Arc::clone(&engine),
            Arc::clone(&queue),
            result_tx.clone(),
            Arc::clone(&shared),
            total,
        ));
    }

    Ok((WorkerPool { workers }, ReceiverStream::new(result_rx)))
}

async fn worker<E: OcrEngine>(
    engine: Arc<E>,
    queue: Arc<Mutex<mpsc::Receiver<PageRequest>>>,
    results: mpsc::Sender<PageResult>,
    config: Arc<OcrConfig>,
    total: usize,
) {
    let progress = config.progress_callback.as_ref();
    loop {
        let next = queue.lock().await.recv().await;
        let Some(request) = next else {
            break;
        };

        let page_num = config.page_number(request.sequence);
        if let Some(cb) = progress {
            cb.on_page_start(page_num, total);
        }

        let text = engine.recognize(&request, page_num).await;

        if let Some(cb) = progress {
            match &text {
                Ok(t) => cb.on_page_complete(page_num, total, t.len()),
                Err(e) => cb.on_page_error(page_num, total, &e.to_string()),
            }
        }

        if results.send(PageResult { request, text }).await.is_err() {
            // reassembler is gone
            break;
        }
    }
}
