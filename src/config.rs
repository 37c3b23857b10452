//! Configuration types for document-to-text conversion.
//!
//! Every knob of a run lives in one immutable [`OcrConfig`], built once via
//! [`OcrConfigBuilder`] and passed by reference into each pipeline stage.
//! Nothing is stored in process-wide state, so two conversions with different
//! settings can run side by side in the same process.

use crate::error::OcrError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Default OCR language code handed to the engine.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Configuration for a single conversion run.
///
/// Built via [`OcrConfig::builder()`] or using [`OcrConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr2text::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .language("deu")
///     .first_page(3)
///     .last_page(9)
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.first_page, 3);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Language code passed to the OCR engine (`-l`). Default: `eng`.
    pub language: String,

    /// First page to extract, 1-indexed. Default: 1.
    ///
    /// Also the offset added to a page's sequence number when reporting
    /// errors, so messages name the physical page.
    pub first_page: usize,

    /// Last page to extract, 1-indexed and inclusive. Default: None (to the end).
    pub last_page: Option<usize>,

    /// Number of concurrent OCR workers. Default: number of logical CPUs.
    ///
    /// Each worker runs one engine subprocess at a time, so this is also the
    /// bound on concurrently running OCR processes and on results waiting
    /// for the reassembler.
    pub workers: usize,

    /// Rule files, compiled in order into line and document filters.
    pub rule_files: Vec<PathBuf>,

    /// Program used to extract page images from PDF input. Default: `pdfimages`.
    pub pdf_extractor: PathBuf,

    /// Program used to extract page images from DjVu input. Default: `ddjvu`.
    pub djvu_extractor: PathBuf,

    /// OCR engine program. Default: `tesseract`.
    pub ocr_engine: PathBuf,

    /// Directory in which the per-run working directory is created.
    /// Default: None (the system temporary directory).
    pub temp_root: Option<PathBuf>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            first_page: 1,
            last_page: None,
            workers: num_cpus::get().max(1),
            rule_files: Vec::new(),
            pdf_extractor: PathBuf::from("pdfimages"),
            djvu_extractor: PathBuf::from("ddjvu"),
            ocr_engine: PathBuf::from("tesseract"),
            temp_root: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("language", &self.language)
            .field("first_page", &self.first_page)
            .field("last_page", &self.last_page)
            .field("workers", &self.workers)
            .field("rule_files", &self.rule_files)
            .field("pdf_extractor", &self.pdf_extractor)
            .field("djvu_extractor", &self.djvu_extractor)
            .field("ocr_engine", &self.ocr_engine)
            .field("temp_root", &self.temp_root)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// Human-facing page number of the page with the given sequence number.
    pub fn page_number(&self, sequence: usize) -> usize {
        sequence + self.first_page
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn language(mut self, code: impl Into<String>) -> Self {
        self.config.language = code.into();
        self
    }

    pub fn first_page(mut self, page: usize) -> Self {
        self.config.first_page = page;
        self
    }

    pub fn last_page(mut self, page: usize) -> Self {
        self.config.last_page = Some(page);
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn rule_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rule_files.push(path.into());
        self
    }

    pub fn rule_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.config.rule_files.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn pdf_extractor(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.pdf_extractor = program.into();
        self
    }

    pub fn djvu_extractor(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.djvu_extractor = program.into();
        self
    }

    pub fn ocr_engine(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.ocr_engine = program.into();
        self
    }

    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if c.first_page == 0 {
            return Err(OcrError::InvalidConfig(
                "Pages are 1-indexed, first page must be ≥ 1".into(),
            ));
        }
        if let Some(last) = c.last_page {
            if last < c.first_page {
                return Err(OcrError::InvalidConfig(format!(
                    "Last page ({}) is before first page ({})",
                    last, c.first_page
                )));
            }
        }
        if c.language.trim().is_empty() {
            return Err(OcrError::InvalidConfig(
                "Language code must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = OcrConfig::builder().build().expect("defaults validate");
        assert_eq!(config.language, "eng");
        assert_eq!(config.first_page, 1);
        assert_eq!(config.last_page, None);
        assert!(config.workers >= 1);
        assert_eq!(config.ocr_engine, PathBuf::from("tesseract"));
    }

    #[test]
    fn rejects_zero_first_page() {
        let err = OcrConfig::builder().first_page(0).build().unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_inverted_range() {
        let err = OcrConfig::builder()
            .first_page(5)
            .last_page(2)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("before first page"), "got: {err}");
    }

    #[test]
    fn workers_clamped_to_one() {
        let config = OcrConfig::builder().workers(0).build().unwrap();
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn rule_files_keep_order() {
        let config = OcrConfig::builder()
            .rule_file("a.rules")
            .rule_files(["b.rules", "c.rules"])
            .build()
            .unwrap();
        let names: Vec<_> = config
            .rule_files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.rules", "b.rules", "c.rules"]);
    }

    #[test]
    fn page_number_adds_first_page_offset() {
        let config = OcrConfig::builder().first_page(10).build().unwrap();
        assert_eq!(config.page_number(0), 10);
        assert_eq!(config.page_number(3), 13);
    }
}
