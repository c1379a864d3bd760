//! Poppler subprocess helpers for PDF text extraction and page rendering
//!
//! Tool output goes to files inside the document's working directory, never
//! through pipes, so a noisy tool can't deadlock the polling wait loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Per-tool timeouts
const INFO_TIMEOUT: Duration = Duration::from_secs(10);
const TEXT_TIMEOUT: Duration = Duration::from_secs(30);
const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Render resolution for OCR input
const RENDER_DPI: &str = "300";

#[derive(Debug)]
pub enum PdfError {
    /// Tool exited non-zero or produced nothing
    Tool(String),
    Io(std::io::Error),
    /// Tool did not finish within its timeout
    Timeout(&'static str),
}

impl std::fmt::Display for PdfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tool(msg) => write!(f, "{msg}"),
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Timeout(tool) => write!(f, "{tool} timed out"),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<std::io::Error> for PdfError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Whether the poppler tools are on PATH (checked once per run).
pub fn poppler_available() -> bool {
    Command::new("pdftotext")
        .arg("-v")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// A fetched PDF staged into a private working directory.
pub struct PdfDocument {
    dir: tempfile::TempDir,
    pdf_path: PathBuf,
}

impl PdfDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        let dir = tempfile::TempDir::new()?;
        let pdf_path = dir.path().join("book.pdf");
        fs::write(&pdf_path, bytes)?;
        Ok(Self { dir, pdf_path })
    }

    pub fn page_count(&self) -> Result<usize, PdfError> {
        let out_path = self.dir.path().join("info.txt");
        let mut cmd = Command::new("pdfinfo");
        cmd.arg(&self.pdf_path);
        run_tool(cmd, INFO_TIMEOUT, "pdfinfo", Some(&out_path))?;

        let info = fs::read_to_string(&out_path)?;
        parse_page_count(&info)
            .ok_or_else(|| PdfError::Tool("pdfinfo reported no page count".to_string()))
    }

    /// Embedded text of one page (1-based), empty when the page has none.
    pub fn page_text(&self, page: usize) -> Result<String, PdfError> {
        let out_path = self.dir.path().join(format!("page_{page}.txt"));
        let mut cmd = Command::new("pdftotext");
        cmd.args(["-f", &page.to_string(), "-l", &page.to_string(), "-enc", "UTF-8"])
            .arg(&self.pdf_path)
            .arg(&out_path);
        run_tool(cmd, TEXT_TIMEOUT, "pdftotext", None)?;
        Ok(fs::read_to_string(&out_path)?)
    }

    /// Render one page (1-based) to a PNG for the OCR engine.
    pub fn render_page(&self, page: usize) -> Result<PathBuf, PdfError> {
        let render_dir = self.dir.path().join(format!("render_{page}"));
        fs::create_dir_all(&render_dir)?;

        let mut cmd = Command::new("pdftoppm");
        cmd.args(["-f", &page.to_string(), "-l", &page.to_string()])
            .args(["-r", RENDER_DPI, "-png"])
            .arg(&self.pdf_path)
            .arg(render_dir.join("page"));
        run_tool(cmd, RENDER_TIMEOUT, "pdftoppm", None)?;

        // pdftoppm picks its own zero-padding for the page suffix
        let rendered = fs::read_dir(&render_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| p.extension().is_some_and(|ext| ext == "png"));
        rendered.ok_or_else(|| PdfError::Tool(format!("pdftoppm produced no image for page {page}")))
    }
}

fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    pdfinfo_output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Run a tool with stdout directed to `capture` (or discarded) and stderr
/// to a scratch file, killing the child if it exceeds `timeout`. Output
/// never goes through pipes, so a noisy tool can't fill a pipe buffer and
/// wedge the wait loop.
fn run_tool(
    mut cmd: Command,
    timeout: Duration,
    tool: &'static str,
    capture: Option<&Path>,
) -> Result<(), PdfError> {
    let stderr_file = tempfile::NamedTempFile::new()?;

    match capture {
        Some(path) => {
            cmd.stdout(fs::File::create(path)?);
        }
        None => {
            cmd.stdout(Stdio::null());
        }
    }
    cmd.stderr(stderr_file.reopen()?);
    cmd.stdin(Stdio::null());

    let mut child = cmd
        .spawn()
        .map_err(|e| PdfError::Tool(format!("cannot run {tool}: {e}")))?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PdfError::Timeout(tool));
            }
            None => std::thread::sleep(Duration::from_millis(50)),
        }
    };

    if status.success() {
        Ok(())
    } else {
        let stderr = fs::read_to_string(stderr_file.path()).unwrap_or_default();
        let summary: String = stderr.chars().take(200).collect();
        Err(PdfError::Tool(format!("{tool} failed: {}", summary.trim())))
    }
}
