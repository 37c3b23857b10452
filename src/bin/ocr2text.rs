//! CLI binary for ocr2text.
//!
//! A thin shim over the library crate that maps CLI flags to `OcrConfig`,
//! writes the text and turns any failure into a single `ERROR:` line.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr2text::{
    convert, convert_to_file, ConversionProgressCallback, OcrConfig, OcrError, ProgressCallback,
    DEFAULT_LANGUAGE,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Exit status after an interrupt, following the shell's 128 + SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Pages complete out of order, so start times are kept per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Extracting");
        bar.set_message("page images…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Recognising");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Remove the bar after a failed run.
    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let elapsed = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} bytes")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed = self.elapsed_secs(page_num);

        // Keep the log line on one terminal row.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages recognised",
            green("✔"),
            bold(&total_pages.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  ocr2text scan.pdf

  # Convert to file
  ocr2text scan.djvu -o scan.txt

  # Pages 5 to 12, German, with clean-up rules
  ocr2text -f 5 -l 12 -L deu -F ligatures.rules -F hyphens.rules book.pdf

  # JSON output with stats
  ocr2text --json scan.pdf > scan.json

RULE FILES:
  One rule per line: SCOPE TYPE "MATCH" "REPLACEMENT"
    SCOPE  line | document
    TYPE   word (literal) | regex (replacement may use $1, ${name})
  Strings are "double-quoted" with escapes, or `back-quoted` raw.
  // and /* */ comments are ignored.

    line      word   "ﬁ"             "fi"
    document  regex  `(\w)-\n(\w)`   "$1$2"

ENVIRONMENT VARIABLES:
  OCR2TEXT_LANGUAGE      OCR language code
  OCR2TEXT_FILTERS       Comma-separated rule files
  OCR2TEXT_JOBS          Number of OCR workers
  OCR2TEXT_PDFIMAGES     pdfimages executable
  OCR2TEXT_DDJVU         ddjvu executable
  OCR2TEXT_TESSERACT     tesseract executable
  RUST_LOG               Log filter (overrides -v / -q)

REQUIREMENTS:
  pdfimages (poppler-utils, with -tiff support) for PDF input,
  ddjvu (djvulibre) for DjVu input, and tesseract with the language data.
"#;

/// Convert scanned PDF and DjVu documents to text with tesseract.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2text",
    version,
    about = "Convert scanned PDF and DjVu documents to text with tesseract",
    long_about = "Extract one image per page with pdfimages or ddjvu, recognise the pages in \
parallel with tesseract, and print the text in page order after applying optional \
substitution rules.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF (.pdf) or DjVu (.djvu, .djv) document.
    input: PathBuf,

    /// Write text to this file instead of stdout.
    #[arg(short, long, env = "OCR2TEXT_OUTPUT")]
    output: Option<PathBuf>,

    /// First page to convert (1-indexed).
    #[arg(short, long, default_value_t = 1)]
    first: usize,

    /// Last page to convert (default: last page of the document).
    #[arg(short, long)]
    last: Option<usize>,

    /// OCR language code(s), as understood by tesseract (e.g. eng, deu+eng).
    #[arg(short = 'L', long, env = "OCR2TEXT_LANGUAGE", default_value = DEFAULT_LANGUAGE)]
    language: String,

    /// Rule file; may be repeated, rules apply in the order given.
    #[arg(short = 'F', long = "filter", env = "OCR2TEXT_FILTERS", value_delimiter = ',')]
    filters: Vec<PathBuf>,

    /// Number of concurrent OCR workers (default: number of CPUs).
    #[arg(short = 'j', long, env = "OCR2TEXT_JOBS")]
    jobs: Option<usize>,

    /// Print JSON (text + stats) to stdout instead of plain text.
    #[arg(long, env = "OCR2TEXT_JSON", conflicts_with = "output")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2TEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2TEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2TEXT_QUIET")]
    quiet: bool,

    /// pdfimages executable.
    #[arg(long, env = "OCR2TEXT_PDFIMAGES", default_value = "pdfimages")]
    pdfimages: PathBuf,

    /// ddjvu executable.
    #[arg(long, env = "OCR2TEXT_DDJVU", default_value = "ddjvu")]
    ddjvu: PathBuf,

    /// tesseract executable.
    #[arg(long, env = "OCR2TEXT_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters; keep INFO logs
    // out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new_dynamic);

    match run(&cli, progress.clone()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(ref bar) = progress {
                bar.abandon();
            }
            eprintln!("ERROR: {e}");
            match e.downcast_ref::<OcrError>() {
                Some(OcrError::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: &Cli, progress: Option<Arc<CliProgressCallback>>) -> Result<()> {
    let show_progress = progress.is_some();
    let progress_cb = progress.map(|cb| cb as ProgressCallback);
    let config = build_config(cli, progress_cb)?;

    if let Some(ref output_path) = cli.output {
        let stats = convert_to_file(&cli.input, output_path, &config).await?;

        if !cli.quiet {
            eprintln!(
                "{}  {} pages  {}ms  →  {}",
                green("✔"),
                stats.pages,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    let output = convert(&cli.input, &config).await?;

    if cli.json {
        let json = serde_json::json!({
            "text": output.text_lossy(),
            "stats": output.stats,
        });
        let json = serde_json::to_string_pretty(&json).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&output.text)
            .and_then(|_| handle.flush())
            .context("Failed to write to stdout")?;
    }

    // with the bar active, on_conversion_complete already printed a summary
    if !cli.quiet && !show_progress {
        eprintln!(
            "Converted {} pages in {}ms",
            output.stats.pages, output.stats.total_duration_ms
        );
    }

    Ok(())
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .language(cli.language.clone())
        .first_page(cli.first)
        .rule_files(cli.filters.iter().cloned())
        .pdf_extractor(cli.pdfimages.clone())
        .djvu_extractor(cli.ddjvu.clone())
        .ocr_engine(cli.tesseract.clone());

    if let Some(last) = cli.last {
        builder = builder.last_page(last);
    }
    if let Some(jobs) = cli.jobs {
        builder = builder.workers(jobs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["ocr2text", "scan.pdf"]);
        assert_eq!(cli.first, 1);
        assert_eq!(cli.last, None);
        assert_eq!(cli.language, "eng");
        assert!(cli.filters.is_empty());

        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.first_page, 1);
        assert_eq!(config.ocr_engine, PathBuf::from("tesseract"));
    }

    #[test]
    fn short_flags_map_to_config() {
        let cli = Cli::parse_from([
            "ocr2text", "-f", "3", "-l", "7", "-L", "deu", "-F", "a.rules", "-F", "b.rules", "-j",
            "2", "book.djvu",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.first_page, 3);
        assert_eq!(config.last_page, Some(7));
        assert_eq!(config.language, "deu");
        assert_eq!(config.workers, 2);
        assert_eq!(
            config.rule_files,
            vec![PathBuf::from("a.rules"), PathBuf::from("b.rules")]
        );
    }

    #[test]
    fn json_and_output_file_conflict() {
        let err = Cli::try_parse_from(["ocr2text", "--json", "-o", "out.txt", "scan.pdf"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let cli = Cli::parse_from(["ocr2text", "-f", "9", "-l", "2", "scan.pdf"]);
        let err = build_config(&cli, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OcrError>(),
            Some(OcrError::InvalidConfig(_))
        ));
    }
}
