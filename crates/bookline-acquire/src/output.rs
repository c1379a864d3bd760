//! Finished-document output for the practice session
//!
//! One UTF-8 text file per acquired book with a small metadata header.
//! This boundary carries no feedback; the practice session only reads.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bookline_extract::ExtractionMethod;

/// Where a finished document came from.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub adapter: &'static str,
    pub method: ExtractionMethod,
    pub source_url: String,
    pub ocr_confidence: Option<f32>,
}

/// A validated document ready for typing practice.
#[derive(Debug)]
pub struct FinishedDocument {
    pub title: String,
    pub language: String,
    pub text: String,
    pub provenance: Provenance,
}

pub struct DocumentWriter {
    output_dir: PathBuf,
}

impl DocumentWriter {
    pub fn new(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("cannot create output dir {}", output_dir.display()))?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Write `<safe-title>_text.txt` (atomic tmp→rename). Returns the path.
    pub fn write(&self, doc: &FinishedDocument) -> Result<PathBuf> {
        let filename = format!("{}_text.txt", safe_filename(&doc.title));
        let path = self.output_dir.join(&filename);
        let tmp = self.output_dir.join(format!("{filename}.tmp"));

        let mut content = String::new();
        content.push_str(&format!("Title: {}\n", doc.title));
        content.push_str(&format!("Language: {}\n", doc.language));
        content.push_str(&format!("Source: {}\n", doc.provenance.adapter));
        content.push_str(&format!("Source URL: {}\n", doc.provenance.source_url));
        content.push_str(&format!("Extraction Method: {}\n", doc.provenance.method));
        if let Some(confidence) = doc.provenance.ocr_confidence {
            content.push_str(&format!("OCR Confidence: {confidence:.2}\n"));
        }
        content.push_str(&format!(
            "Extracted: {}\n",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
        ));
        content.push_str(&"=".repeat(50));
        content.push_str("\n\n");
        content.push_str(&doc.text);
        content.push('\n');

        fs::write(&tmp, content).with_context(|| format!("cannot write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("cannot commit {}", path.display()))?;
        Ok(path)
    }
}

/// Keep alphanumerics, spaces (as underscores), dashes; cap the length.
fn safe_filename(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect();
    let name: String = kept.trim().replace(' ', "_").chars().take(100).collect();
    if name.is_empty() {
        "untitled".to_string()
    } else {
        name
    }
}
