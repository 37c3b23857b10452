//! Page-image extraction via external tools.
//!
//! The input's extension picks the extractor:
//!
//! | Extension      | Tool        | Output in the working directory |
//! |----------------|-------------|---------------------------------|
//! | `.pdf`         | `pdfimages` | `page-000.tif`, `page-001.tif`, … |
//! | `.djvu` `.djv` | `ddjvu`     | `00001.tif`, `00002.tif`, …      |
//!
//! Both tools report failures only through their exit status and stderr, so
//! the interesting part here is turning that stderr into a useful message.
//! `pdfimages` prints its whole usage banner when it dislikes its arguments,
//! which is useless to a user; we replace it with the argument list. `ddjvu`
//! prefixes its diagnostics with its own name and a bracketed tag, which we
//! strip.

use crate::config::OcrConfig;
use crate::error::OcrError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

/// Output-format option `pdfimages` must support for the pipeline to work.
pub const PDF_TIFF_OPTION: &str = "-tiff";

/// Open upper bound for `ddjvu` page ranges without a last page.
const DJVU_LAST_PAGE: usize = 100_000;

static RE_TIFF_OPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s+-tiff\s+").unwrap());

static RE_DJVU_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\[[^\]]*\]\s*)?").unwrap());

/// Supported input document families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Djvu,
}

impl InputKind {
    /// Pick the input family from the file extension (ASCII case-insensitive).
    pub fn detect(path: &Path) -> Result<Self, OcrError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("pdf") => Ok(InputKind::Pdf),
            Some("djvu") | Some("djv") => Ok(InputKind::Djvu),
            _ => Err(OcrError::UnsupportedInputType {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Populate `dir` with one TIFF image per page of `input`.
pub async fn extract_images(
    input: &Path,
    kind: InputKind,
    dir: &Path,
    config: &OcrConfig,
) -> Result<(), OcrError> {
    match kind {
        InputKind::Pdf => extract_pdf(input, dir, config).await,
        InputKind::Djvu => extract_djvu(input, dir, config).await,
    }
}

async fn extract_pdf(input: &Path, dir: &Path, config: &OcrConfig) -> Result<(), OcrError> {
    let program = &config.pdf_extractor;
    let tool = tool_name(program);

    probe_pdf_extractor(program).await?;

    let args = pdf_args(input, dir, config);
    info!("Extracting page images with {}", tool);
    let output = run_tool(program, &args).await?;

    if output.status.success() {
        return Ok(());
    }

    Err(OcrError::ExtractorFailed {
        message: pdf_failure_message(&tool, &output, &args),
        tool,
    })
}

/// Check that the installed `pdfimages` supports TIFF output.
///
/// The help text is scanned on both output streams regardless of exit
/// status, since versions differ on where they print it and how they exit.
async fn probe_pdf_extractor(program: &Path) -> Result<(), OcrError> {
    let tool = tool_name(program);
    let output = run_tool(program, &[OsString::from("--help")]).await?;

    let help = [output.stderr.as_slice(), output.stdout.as_slice()].concat();
    if RE_TIFF_OPTION.is_match(&String::from_utf8_lossy(&help)) {
        debug!("{} supports {}", tool, PDF_TIFF_OPTION);
        return Ok(());
    }

    Err(OcrError::ExtractorCapability {
        tool,
        option: PDF_TIFF_OPTION.to_string(),
    })
}

/// `pdfimages -tiff -f FIRST [-l LAST] INPUT DIR/page`
fn pdf_args(input: &Path, dir: &Path, config: &OcrConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        PDF_TIFF_OPTION.into(),
        "-f".into(),
        config.first_page.to_string().into(),
    ];

    if let Some(last) = config.last_page.filter(|&l| l >= config.first_page) {
        args.push("-l".into());
        args.push(last.to_string().into());
    }

    args.push(input.into());
    args.push(dir.join("page").into());
    args
}

async fn extract_djvu(input: &Path, dir: &Path, config: &OcrConfig) -> Result<(), OcrError> {
    let program = &config.djvu_extractor;
    let tool = tool_name(program);

    let args = djvu_args(input, dir, config);
    info!("Extracting page images with {}", tool);
    let output = run_tool(program, &args).await?;

    if output.status.success() {
        return Ok(());
    }

    Err(OcrError::ExtractorFailed {
        message: djvu_failure_message(&tool, &output),
        tool,
    })
}

/// `ddjvu -format=tiff -mode=black -eachpage [-page=F-L] INPUT DIR/%05d.tif`
fn djvu_args(input: &Path, dir: &Path, config: &OcrConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-format=tiff".into(),
        "-mode=black".into(),
        "-eachpage".into(),
    ];

    match config.last_page {
        Some(last) if config.first_page <= last => {
            args.push(format!("-page={}-{}", config.first_page, last).into());
        }
        _ if config.first_page > 1 => {
            args.push(format!("-page={}-{}", config.first_page, DJVU_LAST_PAGE).into());
        }
        _ => {}
    }

    args.push(input.into());
    args.push(dir.join("%05d.tif").into());
    args
}

/// Message for a failed `pdfimages` run.
fn pdf_failure_message(tool: &str, output: &Output, args: &[OsString]) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);

    if stderr.starts_with(tool) {
        // usage banner rather than a diagnostic
        format!(
            "Program '{}' exited with an error; parameters: {}",
            tool,
            join_args(args)
        )
    } else if stderr.trim().is_empty() {
        format!(
            "Program '{}' exited with {}; parameters: {}",
            tool,
            output.status,
            join_args(args)
        )
    } else {
        stderr.trim().to_string()
    }
}

/// Message for a failed `ddjvu` run: the first stderr line without the
/// `ddjvu: [tag]` prefix.
fn djvu_failure_message(tool: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let first = stderr.lines().next().unwrap_or("");
    let first = first
        .strip_prefix(tool)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(|rest| RE_DJVU_TAG.replace(rest, "").into_owned())
        .unwrap_or_else(|| first.to_string());

    let message = first.trim();
    if message.is_empty() {
        format!("Program '{}' exited with {}", tool, output.status)
    } else {
        message.to_string()
    }
}

async fn run_tool(program: &Path, args: &[OsString]) -> Result<Output, OcrError> {
    debug!("Running {} {}", program.display(), join_args(args));
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| OcrError::ToolLaunch {
            tool: program.display().to_string(),
            source: e,
        })
}

/// Display name of a tool: the file name of its program path.
fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}

fn join_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[cfg(unix)]
    fn output(code: i32, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn detect_by_extension() {
        assert_eq!(InputKind::detect(Path::new("a.pdf")).unwrap(), InputKind::Pdf);
        assert_eq!(InputKind::detect(Path::new("A.PDF")).unwrap(), InputKind::Pdf);
        assert_eq!(InputKind::detect(Path::new("b.djvu")).unwrap(), InputKind::Djvu);
        assert_eq!(InputKind::detect(Path::new("b.djv")).unwrap(), InputKind::Djvu);
    }

    #[test]
    fn detect_rejects_unknown_types() {
        for name in ["doc.docx", "noext", "archive.pdf.gz"] {
            let err = InputKind::detect(Path::new(name)).unwrap_err();
            assert!(
                matches!(err, OcrError::UnsupportedInputType { .. }),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn pdf_args_with_and_without_last_page() {
        let dir = PathBuf::from("/tmp/ocr-x");
        let config = OcrConfig::builder().first_page(2).build().unwrap();
        assert_eq!(
            strings(&pdf_args(Path::new("in.pdf"), &dir, &config)),
            ["-tiff", "-f", "2", "in.pdf", "/tmp/ocr-x/page"]
        );

        let config = OcrConfig::builder().first_page(2).last_page(5).build().unwrap();
        assert_eq!(
            strings(&pdf_args(Path::new("in.pdf"), &dir, &config)),
            ["-tiff", "-f", "2", "-l", "5", "in.pdf", "/tmp/ocr-x/page"]
        );
    }

    #[test]
    fn djvu_page_range_conventions() {
        let dir = PathBuf::from("/w");

        let all = OcrConfig::builder().build().unwrap();
        assert_eq!(
            strings(&djvu_args(Path::new("b.djvu"), &dir, &all)),
            ["-format=tiff", "-mode=black", "-eachpage", "b.djvu", "/w/%05d.tif"]
        );

        let range = OcrConfig::builder().first_page(3).last_page(4).build().unwrap();
        assert!(strings(&djvu_args(Path::new("b.djvu"), &dir, &range)).contains(&"-page=3-4".to_string()));

        let open = OcrConfig::builder().first_page(3).build().unwrap();
        assert!(strings(&djvu_args(Path::new("b.djvu"), &dir, &open)).contains(&"-page=3-100000".to_string()));
    }

    #[test]
    fn tiff_option_detection() {
        let help = "pdfimages version 22.02.0\nUsage: pdfimages [options] <PDF-file> <image-root>\n  -f <int>  : first page\n  -tiff     : write TIFF images\n";
        assert!(RE_TIFF_OPTION.is_match(help));
        assert!(!RE_TIFF_OPTION.is_match("Usage: pdfimages\n  -j        : write JPEG\n"));
        // only as an option column, not in prose
        assert!(!RE_TIFF_OPTION.is_match("no -tiff support here\n"));
    }

    #[cfg(unix)]
    #[test]
    fn pdf_usage_banner_is_replaced() {
        let args: Vec<OsString> = vec!["-tiff".into(), "-f".into(), "1".into()];
        let msg = pdf_failure_message(
            "pdfimages",
            &output(99, "pdfimages version 4.00\nUsage: pdfimages [options]\n"),
            &args,
        );
        assert_eq!(msg, "Program 'pdfimages' exited with an error; parameters: -tiff -f 1");
    }

    #[cfg(unix)]
    #[test]
    fn pdf_diagnostic_is_kept() {
        let msg = pdf_failure_message(
            "pdfimages",
            &output(1, "  Syntax Error: Couldn't open file 'x.pdf'\n"),
            &[],
        );
        assert_eq!(msg, "Syntax Error: Couldn't open file 'x.pdf'");
    }

    #[cfg(unix)]
    #[test]
    fn djvu_prefix_and_trace_are_stripped() {
        let msg = djvu_failure_message(
            "ddjvu",
            &output(
                1,
                "ddjvu: [1-11711] Unexpected End Of File.\n*** (DataPool.cpp:1745)\n*** 'void DJVU::DataPool::...'\n",
            ),
        );
        assert_eq!(msg, "Unexpected End Of File.");

        let msg = djvu_failure_message("ddjvu", &output(1, "ddjvu: Cannot open file\n"));
        assert_eq!(msg, "Cannot open file");
    }

    #[cfg(unix)]
    #[test]
    fn empty_stderr_reports_status() {
        let msg = djvu_failure_message("ddjvu", &output(3, ""));
        assert!(msg.starts_with("Program 'ddjvu' exited with"), "got: {msg}");
    }

    #[test]
    fn tool_name_is_file_name() {
        assert_eq!(tool_name(Path::new("/usr/local/bin/pdfimages")), "pdfimages");
        assert_eq!(tool_name(Path::new("ddjvu")), "ddjvu");
    }
}
