//! OCR engine seam: tesseract subprocess backend
//!
//! The engine is an optional capability: probed once at startup, and its
//! absence degrades extraction to embedded-text-only instead of failing
//! the run.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Per-page OCR timeout
const OCR_TIMEOUT: Duration = Duration::from_secs(60);

/// Recognized text plus the engine's mean word confidence (0–1).
#[derive(Debug, Clone)]
pub struct OcrText {
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug)]
pub enum OcrError {
    Tool(String),
    Io(std::io::Error),
    Timeout,
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tool(msg) => write!(f, "{msg}"),
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Timeout => write!(f, "OCR timed out"),
        }
    }
}

impl std::error::Error for OcrError {}

impl From<std::io::Error> for OcrError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// One OCR backend. Input is a rendered page image; output is text with an
/// engine-reported confidence.
pub trait OcrEngine: Send + Sync {
    fn id(&self) -> &'static str;
    fn recognize(&self, image: &Path) -> Result<OcrText, OcrError>;
}

/// Tesseract CLI backend.
pub struct Tesseract {
    lang: &'static str,
}

impl Tesseract {
    /// Probe the binary once; `None` means run without OCR.
    pub fn probe(language: &str) -> Option<Self> {
        let available = Command::new("tesseract")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success());
        if !available {
            return None;
        }
        Some(Self {
            lang: tesseract_lang(language),
        })
    }
}

impl OcrEngine for Tesseract {
    fn id(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &Path) -> Result<OcrText, OcrError> {
        let dir = tempfile::TempDir::new()?;
        let out_base = dir.path().join("page");

        let mut cmd = Command::new("tesseract");
        cmd.arg(image)
            .arg(&out_base)
            .args(["-l", self.lang, "tsv"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| OcrError::Tool(format!("cannot run tesseract: {e}")))?;
        let deadline = Instant::now() + OCR_TIMEOUT;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(OcrError::Timeout);
                }
                None => std::thread::sleep(Duration::from_millis(50)),
            }
        };
        if !status.success() {
            return Err(OcrError::Tool(format!("tesseract exited with {status}")));
        }

        let tsv = fs::read_to_string(out_base.with_extension("tsv"))?;
        parse_tsv(&tsv).ok_or_else(|| OcrError::Tool("tesseract recognized no words".to_string()))
    }
}

/// Parse tesseract TSV output: join recognized words, average their
/// confidences. Rows with conf -1 are layout markers, not words.
fn parse_tsv(tsv: &str) -> Option<OcrText> {
    let mut text = String::new();
    let mut confidences: Vec<f32> = Vec::new();
    let mut last_line_id: Option<(u32, u32, u32)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let word = cols[11].trim();
        if conf < 0.0 || word.is_empty() {
            continue;
        }

        let line_id = (
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        if !text.is_empty() {
            if last_line_id == Some(line_id) {
                text.push(' ');
            } else {
                text.push('\n');
            }
        }
        last_line_id = Some(line_id);
        text.push_str(word);
        confidences.push(conf / 100.0);
    }

    if confidences.is_empty() {
        return None;
    }
    let confidence = confidences.iter().sum::<f32>() / confidences.len() as f32;
    Some(OcrText { text, confidence })
}

/// Language name → tesseract traineddata code, defaulting to English.
fn tesseract_lang(language_name: &str) -> &'static str {
    match language_name.to_lowercase().as_str() {
        "french" => "fra",
        "spanish" => "spa",
        "german" => "deu",
        "italian" => "ita",
        "portuguese" => "por",
        "russian" => "rus",
        "dutch" => "nld",
        "swedish" => "swe",
        "norwegian" => "nor",
        "danish" => "dan",
        "finnish" => "fin",
        "polish" => "pol",
        "czech" => "ces",
        "hungarian" => "hun",
        "turkish" => "tur",
        "greek" => "ell",
        _ => "eng",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn parse_tsv_joins_words_and_averages() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t\n\
             5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t90\tIl\n\
             5\t1\t1\t1\t1\t2\t12\t0\t10\t10\t80\tétait\n\
             5\t1\t1\t1\t2\t1\t0\t12\t10\t10\t70\tune\n"
        );
        let out = parse_tsv(&tsv).unwrap();
        assert_eq!(out.text, "Il était\nune");
        assert!((out.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn parse_tsv_skips_markers() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t\n\
             2\t1\t1\t0\t0\t0\t0\t0\t100\t100\t-1\t\n"
        );
        assert!(parse_tsv(&tsv).is_none());
    }

    #[test]
    fn parse_tsv_empty_input() {
        assert!(parse_tsv("").is_none());
        assert!(parse_tsv(HEADER).is_none());
    }

    #[test]
    fn confidence_normalized() {
        let tsv = format!("{HEADER}\n5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t42.5\tmot\n");
        let out = parse_tsv(&tsv).unwrap();
        assert!((out.confidence - 0.425).abs() < 1e-6);
    }

    #[test]
    fn language_mapping_defaults_to_english() {
        assert_eq!(tesseract_lang("French"), "fra");
        assert_eq!(tesseract_lang("german"), "deu");
        assert_eq!(tesseract_lang("klingon"), "eng");
    }
}
