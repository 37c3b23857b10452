//! # ocr2text
//!
//! Convert scanned PDF and DjVu documents to plain text with an external OCR
//! engine, one page per worker, and clean the result up with a small
//! substitution-rule language.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DjVu
//!  │
//!  ├─ 1. Rules     compile rule files into line + document filters
//!  ├─ 2. Extract   one TIFF per page via pdfimages / ddjvu (subprocess)
//!  ├─ 3. OCR       tesseract per page on a pool of N workers
//!  ├─ 4. Reorder   min-heap restores page order, line filter per line
//!  ├─ 5. Document  document filter over the assembled text
//!  └─ 6. Output    text + stats
//! ```
//!
//! Page images live in a temporary directory that is removed on every exit
//! path, including Ctrl-C.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr2text::{convert, OcrConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OcrConfig::builder()
//!         .language("eng")
//!         .rule_file("cleanup.rules")
//!         .build()?;
//!     let output = convert("scan.pdf", &config).await?;
//!     print!("{}", output.text_lossy());
//!     eprintln!("{} pages in {}ms", output.stats.pages, output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2text` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ocr2text = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Tool | Used for |
//! |------|----------|
//! | `pdfimages` (poppler-utils) | PDF page images; must support `-tiff` |
//! | `ddjvu` (djvulibre) | DjVu page images |
//! | `tesseract` | OCR, with the language data for `OcrConfig::language` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod rules;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrConfig, OcrConfigBuilder, DEFAULT_LANGUAGE};
pub use convert::{convert, convert_sync, convert_to_file, convert_with_cancel, convert_with_filters};
pub use error::{OcrError, PageError};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::ocr::{OcrEngine, Tesseract};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use rules::{Filter, Filters, Rule, RuleKind, RuleScope, Transform};
