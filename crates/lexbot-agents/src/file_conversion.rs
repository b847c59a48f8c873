//! `Convert <file> to <format>` on files the bot can see.
//!
//! Parsing and the existence check answer immediately; the conversion itself runs as a
//! pending reply so the router's dispatch timeout applies to external tools.
//!
//! Routes:
//! - PDF -> DOCX: `pdftotext -layout` piped into pandoc (markdown reader)
//! - XLSX/XLS/ODS -> CSV: first worksheet via calamine
//! - everything else: pandoc

use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    sync::OnceLock,
};

use calamine::{open_workbook_auto, Data, Reader};
use regex::Regex;
use tokio::{io::AsyncWriteExt, process::Command};

use lexbot_core::{
    capability::{Capability, Reply},
    classifier::CONVERSION_PATTERN,
    config::Config,
    Result,
};

const USAGE_REPLY: &str = "⚠️ Usage: Convert <filename> to <format>";
const STDERR_PREVIEW: usize = 300;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source: String,
    /// Target extension, lowercased, without the leading dot.
    pub format: String,
}

fn command_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(CONVERSION_PATTERN).ok())
        .as_ref()
}

/// Parse `Convert <source> to <format>` with the same pattern the classifier routes on.
/// Keywords are case-insensitive and may be separated by any whitespace; the last `to`
/// splits, so file names may contain " to ".
pub fn parse_command(query: &str) -> Option<ConversionRequest> {
    let caps = command_pattern()?.captures(query.trim())?;
    let source = caps.get(1)?.as_str().trim();
    let format = caps
        .get(2)?
        .as_str()
        .trim()
        .trim_start_matches('.')
        .to_lowercase();
    if source.is_empty() || format.is_empty() {
        return None;
    }
    Some(ConversionRequest {
        source: source.to_string(),
        format,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    PdfToDocx,
    SpreadsheetToCsv,
    Pandoc,
}

fn route_for(source: &Path, format: &str) -> Route {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match (ext.as_str(), format) {
        ("pdf", "docx") => Route::PdfToDocx,
        ("xlsx" | "xls" | "xlsm" | "ods", "csv") => Route::SpreadsheetToCsv,
        _ => Route::Pandoc,
    }
}

/// Pandoc writer for a target extension; `None` lets pandoc infer from the output file.
fn pandoc_writer(format: &str) -> Option<&str> {
    match format {
        "pdf" => None,
        "txt" => Some("plain"),
        "md" => Some("markdown"),
        "htm" => Some("html"),
        "tex" => Some("latex"),
        other => Some(other),
    }
}

fn pandoc_args(src: &Path, dst: &Path, format: &str) -> Vec<String> {
    let mut args = vec![src.to_string_lossy().to_string()];
    if let Some(writer) = pandoc_writer(format) {
        args.push("-t".to_string());
        args.push(writer.to_string());
    }
    args.push("-o".to_string());
    args.push(dst.to_string_lossy().to_string());
    args
}

#[derive(Debug, thiserror::Error)]
enum ConversionError {
    #[error("could not run {tool}: {source}")]
    Spawn { tool: String, source: io::Error },

    #[error("{tool} exited with {status}: {stderr}")]
    Tool {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

type ConversionResult = std::result::Result<(), ConversionError>;

fn tool_failure(tool: &Path, status: ExitStatus, stderr: &[u8]) -> ConversionError {
    ConversionError::Tool {
        tool: tool.display().to_string(),
        status,
        stderr: String::from_utf8_lossy(stderr)
            .trim()
            .chars()
            .take(STDERR_PREVIEW)
            .collect(),
    }
}

#[derive(Clone, Debug)]
struct Converter {
    pandoc: PathBuf,
    pdftotext: PathBuf,
}

impl Converter {
    async fn convert(&self, src: &Path, dst: &Path, format: &str) -> ConversionResult {
        match route_for(src, format) {
            Route::PdfToDocx => self.pdf_to_docx(src, dst).await,
            Route::SpreadsheetToCsv => spreadsheet_to_csv(src, dst).await,
            Route::Pandoc => self.pandoc(src, dst, format).await,
        }
    }

    async fn pandoc(&self, src: &Path, dst: &Path, format: &str) -> ConversionResult {
        let out = Command::new(&self.pandoc)
            .args(pandoc_args(src, dst, format))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ConversionError::Spawn {
                tool: self.pandoc.display().to_string(),
                source,
            })?;
        if !out.status.success() {
            return Err(tool_failure(&self.pandoc, out.status, &out.stderr));
        }
        Ok(())
    }

    async fn pdf_to_docx(&self, src: &Path, dst: &Path) -> ConversionResult {
        let text = Command::new(&self.pdftotext)
            .arg("-layout")
            .arg(src)
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ConversionError::Spawn {
                tool: self.pdftotext.display().to_string(),
                source,
            })?;
        if !text.status.success() {
            return Err(tool_failure(&self.pdftotext, text.status, &text.stderr));
        }

        let mut child = Command::new(&self.pandoc)
            .args(["-f", "markdown", "-t", "docx", "-o"])
            .arg(dst)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                tool: self.pandoc.display().to_string(),
                source,
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&text.stdout).await?;
            stdin.shutdown().await?;
        }
        let out = child.wait_with_output().await?;
        if !out.status.success() {
            return Err(tool_failure(&self.pandoc, out.status, &out.stderr));
        }
        Ok(())
    }
}

async fn spreadsheet_to_csv(src: &Path, dst: &Path) -> ConversionResult {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || write_first_sheet_csv(&src, &dst))
        .await
        .map_err(|e| ConversionError::Spreadsheet(format!("conversion task failed: {e}")))?
}

fn write_first_sheet_csv(src: &Path, dst: &Path) -> ConversionResult {
    let mut workbook =
        open_workbook_auto(src).map_err(|e| ConversionError::Spreadsheet(e.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ConversionError::Spreadsheet("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ConversionError::Spreadsheet(e.to_string()))?;

    let mut wtr = csv::Writer::from_path(dst)?;
    for row in range.rows() {
        wtr.write_record(row.iter().map(cell_text))?;
    }
    wtr.flush()?;
    Ok(())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                format!("{}", *f as i64)
            } else {
                format!("{f}")
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{e:?}"),
    }
}

pub struct FileConversion {
    base_dir: PathBuf,
    converter: Converter,
}

impl FileConversion {
    pub fn new(base_dir: PathBuf, pandoc: PathBuf, pdftotext: PathBuf) -> Self {
        Self {
            base_dir,
            converter: Converter { pandoc, pdftotext },
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.conversion_dir.clone(),
            cfg.pandoc_path.clone(),
            cfg.pdftotext_path.clone(),
        )
    }

    /// Log whether the external tools answer `--version`. Missing tools only fail the
    /// conversions that need them.
    pub async fn probe_tools(&self) {
        for (tool, flag) in [
            (&self.converter.pandoc, "--version"),
            (&self.converter.pdftotext, "-v"),
        ] {
            match Command::new(tool).arg(flag).output().await {
                Ok(out) => {
                    // pdftotext prints its version on stderr.
                    let banner = if out.stdout.is_empty() { &out.stderr } else { &out.stdout };
                    let version = String::from_utf8_lossy(banner)
                        .lines()
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    tracing::info!(tool = %tool.display(), %version, "conversion tool found");
                }
                Err(e) => {
                    tracing::warn!(tool = %tool.display(), error = %e, "conversion tool unavailable");
                }
            }
        }
    }

    /// Resolve a user-supplied source to an existing file inside the base directory.
    /// Relative paths are joined to the base; `..`, absolute paths and symlinks that
    /// land outside it resolve to `None`.
    fn resolve(&self, source: &str) -> Option<PathBuf> {
        let base = self.base_dir.canonicalize().ok()?;
        let path = base.join(source).canonicalize().ok()?;
        if !path.starts_with(&base) {
            tracing::warn!(source, base = %base.display(), "conversion source outside base dir");
            return None;
        }
        path.is_file().then_some(path)
    }
}

impl Capability for FileConversion {
    fn name(&self) -> &'static str {
        "file_conversion"
    }

    fn run(&self, query: &str) -> Result<Reply> {
        let Some(req) = parse_command(query) else {
            return Ok(Reply::Immediate(USAGE_REPLY.to_string()));
        };

        let Some(src) = self.resolve(&req.source) else {
            return Ok(Reply::Immediate(format!("⚠️ File not found: {}", req.source)));
        };
        let dst = src.with_extension(&req.format);
        let shown_dst = Path::new(&req.source)
            .with_extension(&req.format)
            .display()
            .to_string();

        let converter = self.converter.clone();
        Ok(Reply::pending(async move {
            tracing::info!(
                src = %src.display(),
                dst = %dst.display(),
                format = %req.format,
                "converting file"
            );
            let reply = match converter.convert(&src, &dst, &req.format).await {
                Ok(()) => format!("✅ Converted '{}' → '{shown_dst}'", req.source),
                Err(e) => {
                    tracing::error!(src = %src.display(), error = %e, "file conversion failed");
                    format!("⚠️ Conversion failed: {e}")
                }
            };
            Ok(reply)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"))
    }

    fn conversion(base: &Path) -> FileConversion {
        FileConversion::new(
            base.to_path_buf(),
            PathBuf::from("/nonexistent/pandoc"),
            PathBuf::from("/nonexistent/pdftotext"),
        )
    }

    async fn settle(reply: Reply) -> String {
        match reply {
            Reply::Immediate(s) => s,
            Reply::Pending(fut) => fut.await.unwrap(),
        }
    }

    #[test]
    fn parses_source_and_format() {
        assert_eq!(
            parse_command("Convert report.pdf to docx"),
            Some(ConversionRequest {
                source: "report.pdf".to_string(),
                format: "docx".to_string(),
            })
        );
        assert_eq!(
            parse_command("  CONVERT My Notes.md TO .HTML "),
            Some(ConversionRequest {
                source: "My Notes.md".to_string(),
                format: "html".to_string(),
            })
        );
    }

    #[test]
    fn splits_on_last_separator() {
        let req = parse_command("convert road to nowhere.txt to pdf").unwrap();
        assert_eq!(req.source, "road to nowhere.txt");
        assert_eq!(req.format, "pdf");
    }

    #[test]
    fn rejects_incomplete_commands() {
        for q in [
            "",
            "convert",
            "convert report.pdf",
            "convert  to docx",
            "convert report.pdf to ",
            "please convert report.pdf to docx",
            "converting a.md to b",
        ] {
            assert_eq!(parse_command(q), None, "{q:?}");
        }
    }

    #[test]
    fn routes_by_extension_pair() {
        assert_eq!(route_for(Path::new("a.PDF"), "docx"), Route::PdfToDocx);
        assert_eq!(route_for(Path::new("a.xlsx"), "csv"), Route::SpreadsheetToCsv);
        assert_eq!(route_for(Path::new("a.ods"), "csv"), Route::SpreadsheetToCsv);
        assert_eq!(route_for(Path::new("a.pdf"), "html"), Route::Pandoc);
        assert_eq!(route_for(Path::new("a.csv"), "xlsx"), Route::Pandoc);
        assert_eq!(route_for(Path::new("README"), "html"), Route::Pandoc);
    }

    #[test]
    fn pandoc_args_infer_pdf_from_output() {
        let args = pandoc_args(Path::new("/d/a.md"), Path::new("/d/a.pdf"), "pdf");
        assert_eq!(args, vec!["/d/a.md", "-o", "/d/a.pdf"]);
        let args = pandoc_args(Path::new("/d/a.md"), Path::new("/d/a.txt"), "txt");
        assert_eq!(args, vec!["/d/a.md", "-t", "plain", "-o", "/d/a.txt"]);
    }

    #[test]
    fn whole_floats_render_as_integers() {
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::Bool(true)), "true");
    }

    #[tokio::test]
    async fn usage_and_missing_file_reply_immediately() {
        let base = tmp("lexbot-conv-missing");
        std::fs::create_dir_all(&base).unwrap();
        let conv = conversion(&base);

        let reply = conv.run("convert stuff").unwrap();
        assert!(!reply.is_pending());
        assert_eq!(settle(reply).await, USAGE_REPLY);

        let reply = conv.run("Convert nope.pdf to docx").unwrap();
        assert!(!reply.is_pending());
        assert_eq!(settle(reply).await, "⚠️ File not found: nope.pdf");

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn missing_tool_reports_conversion_failure() {
        let base = tmp("lexbot-conv-tool");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("notes.md"), "# Notes\n").unwrap();
        let conv = conversion(&base);

        let reply = conv.run("Convert notes.md to html").unwrap();
        assert!(reply.is_pending());
        let text = settle(reply).await;
        assert!(text.starts_with("⚠️ Conversion failed: could not run /nonexistent/pandoc"), "{text}");
        assert!(!base.join("notes.html").exists());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn corrupt_spreadsheet_reports_conversion_failure() {
        let base = tmp("lexbot-conv-xlsx");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("data.xlsx"), b"not a zip archive").unwrap();
        let conv = conversion(&base);

        let text = settle(conv.run("convert data.xlsx to csv").unwrap()).await;
        assert!(text.starts_with("⚠️ Conversion failed: spreadsheet error"), "{text}");

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn sources_outside_base_dir_are_not_found() {
        let root = tmp("lexbot-conv-escape");
        let base = root.join("inbox");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(root.join("secret.md"), "# secret\n").unwrap();
        std::fs::write(base.join("inside.md"), "# inside\n").unwrap();
        let conv = conversion(&base);

        let escapes = [
            "../secret.md".to_string(),
            root.join("secret.md").display().to_string(),
            "/etc/hostname".to_string(),
        ];
        for src in &escapes {
            let reply = conv.run(&format!("Convert {src} to html")).unwrap();
            assert!(!reply.is_pending(), "{src}");
            assert_eq!(settle(reply).await, format!("⚠️ File not found: {src}"));
        }

        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(root.join("secret.md"), base.join("link.md")).unwrap();
            let reply = conv.run("Convert link.md to html").unwrap();
            assert!(!reply.is_pending());
        }

        // Absolute paths that stay inside the base dir are fine.
        let inside = base.join("inside.md");
        let reply = conv.run(&format!("Convert {} to html", inside.display())).unwrap();
        assert!(reply.is_pending());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn parse_agrees_with_classifier_on_whitespace() {
        let classifier = lexbot_core::classifier::IntentClassifier::default();
        for text in [
            "Convert\treport.pdf to docx",
            "convert report.pdf\tTO\tdocx",
            "convert\nnotes.md\nto\nhtml",
            "Convert  My Notes.md   to  .PDF",
        ] {
            assert_eq!(
                classifier.classify(text),
                lexbot_core::domain::CapabilityKey::FILE_CONVERSION,
                "{text:?}"
            );
            assert!(parse_command(text).is_some(), "{text:?}");
        }
        let req = parse_command("Convert\treport.pdf to docx").unwrap();
        assert_eq!(req.source, "report.pdf");
        assert_eq!(req.format, "docx");
    }
}
