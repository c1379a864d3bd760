//! Extraction pipeline: embedded extraction, quality gate, OCR fallback
//!
//! The decision logic is pure and unit-tested; only the page I/O touches
//! poppler/tesseract.

use crate::kind::{self, ContentKind};
use crate::ocr::OcrEngine;
use crate::pdf::PdfDocument;
use crate::quality::{self, QualityThresholds};

/// How the final text was obtained (recorded as provenance).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    PlainText,
    PdfEmbedded,
    PdfOcr,
    ImageOcr,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PlainText => "plain-text",
            Self::PdfEmbedded => "pdf-embedded",
            Self::PdfOcr => "pdf-ocr",
            Self::ImageOcr => "image-ocr",
        })
    }
}

/// Usable text produced from one fetch result.
#[derive(Debug)]
pub struct ExtractedDocument {
    pub text: String,
    pub page_count: usize,
    /// Mean per-page engine confidence; absent when no OCR ran
    pub ocr_confidence: Option<f32>,
    pub method: ExtractionMethod,
}

/// Content did not survive the quality gates.
///
/// `degraded: true` marks rejections caused by a missing capability (no
/// OCR engine for a scanned document); those are only cache-worthy when
/// explicitly configured, since another machine may succeed.
#[derive(Debug)]
pub struct ExtractReject {
    pub reason: &'static str,
    pub degraded: bool,
}

impl std::fmt::Display for ExtractReject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.degraded {
            write!(f, "{} (degraded capability)", self.reason)
        } else {
            f.write_str(self.reason)
        }
    }
}

const fn reject(reason: &'static str) -> ExtractReject {
    ExtractReject {
        reason,
        degraded: false,
    }
}

const fn reject_degraded(reason: &'static str) -> ExtractReject {
    ExtractReject {
        reason,
        degraded: true,
    }
}

pub struct ExtractionPipeline {
    thresholds: QualityThresholds,
    ocr: Option<Box<dyn OcrEngine>>,
    /// Pages read for embedded text (books repeat; a prefix is enough)
    max_pages: usize,
    /// Pages sent through render + OCR
    ocr_max_pages: usize,
}

impl ExtractionPipeline {
    pub fn new(thresholds: QualityThresholds, ocr: Option<Box<dyn OcrEngine>>) -> Self {
        Self {
            thresholds,
            ocr,
            max_pages: 10,
            ocr_max_pages: 5,
        }
    }

    pub fn with_page_limits(mut self, max_pages: usize, ocr_max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self.ocr_max_pages = ocr_max_pages;
        self
    }

    pub fn ocr_available(&self) -> bool {
        self.ocr.is_some()
    }

    /// Run the state machine over raw fetched bytes.
    pub fn extract(
        &self,
        bytes: &[u8],
        mime_hint: Option<&str>,
    ) -> Result<ExtractedDocument, ExtractReject> {
        match kind::detect(bytes, mime_hint) {
            Some(ContentKind::PlainText) => self.extract_plain(bytes),
            Some(ContentKind::Pdf) => self.extract_pdf(bytes),
            Some(ContentKind::Image) => self.extract_image(bytes),
            None => Err(reject("unsupported-content")),
        }
    }

    fn extract_plain(&self, bytes: &[u8]) -> Result<ExtractedDocument, ExtractReject> {
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        if text.is_empty() || quality::printable_ratio(&text) < self.thresholds.plain_text_printable
        {
            return Err(reject("unreadable"));
        }
        Ok(ExtractedDocument {
            text,
            page_count: 1,
            ocr_confidence: None,
            method: ExtractionMethod::PlainText,
        })
    }

    fn extract_pdf(&self, bytes: &[u8]) -> Result<ExtractedDocument, ExtractReject> {
        let doc = PdfDocument::from_bytes(bytes).map_err(|e| {
            log::debug!("pdf staging failed: {e}");
            reject("unreadable")
        })?;
        let total_pages = doc.page_count().map_err(|e| {
            log::debug!("pdfinfo failed: {e}");
            reject("unreadable")
        })?;

        let pages = total_pages.clamp(1, self.max_pages);
        let mut texts: Vec<String> = (1..=pages)
            .map(|p| {
                doc.page_text(p).unwrap_or_else(|e| {
                    log::debug!("pdftotext failed on page {p}: {e}");
                    String::new()
                })
            })
            .collect();
        let flags: Vec<bool> = texts
            .iter()
            .map(|t| quality::page_ok(t, &self.thresholds))
            .collect();

        match embedded_plan(&flags, self.ocr.is_some(), &self.thresholds) {
            PdfPlan::AcceptEmbedded => Ok(ExtractedDocument {
                text: join_pages(&texts),
                page_count: total_pages,
                ocr_confidence: None,
                method: ExtractionMethod::PdfEmbedded,
            }),
            PdfPlan::RejectDegraded => Err(reject_degraded("unreadable")),
            PdfPlan::RunOcr => {
                let engine = self.ocr.as_ref().expect("OCR plan requires an engine");
                let mut confidences: Vec<f32> = Vec::new();
                let mut ocr_budget = self.ocr_max_pages;

                for (i, ok) in flags.iter().enumerate() {
                    if *ok || ocr_budget == 0 {
                        continue;
                    }
                    ocr_budget -= 1;
                    let page_no = i + 1;
                    match doc.render_page(page_no) {
                        Ok(image) => match engine.recognize(&image) {
                            Ok(recognized) => {
                                texts[i] = recognized.text;
                                confidences.push(recognized.confidence);
                            }
                            Err(e) => log::debug!("OCR failed on page {page_no}: {e}"),
                        },
                        Err(e) => log::debug!("render failed on page {page_no}: {e}"),
                    }
                }

                let final_flags: Vec<bool> = texts
                    .iter()
                    .map(|t| quality::page_ok(t, &self.thresholds))
                    .collect();
                let confidence = mean_confidence(&confidences);
                fallback_verdict(&final_flags, confidence, &self.thresholds)?;

                Ok(ExtractedDocument {
                    text: join_pages(&texts),
                    page_count: total_pages,
                    ocr_confidence: confidence,
                    method: ExtractionMethod::PdfOcr,
                })
            }
        }
    }

    fn extract_image(&self, bytes: &[u8]) -> Result<ExtractedDocument, ExtractReject> {
        let Some(engine) = self.ocr.as_ref() else {
            return Err(reject_degraded("unreadable"));
        };

        let dir = tempfile::TempDir::new().map_err(|e| {
            log::debug!("image staging failed: {e}");
            reject("unreadable")
        })?;
        let image = dir.path().join("page");
        std::fs::write(&image, bytes).map_err(|e| {
            log::debug!("image staging failed: {e}");
            reject("unreadable")
        })?;

        let recognized = engine.recognize(&image).map_err(|e| {
            log::debug!("OCR failed: {e}");
            reject("ocr-quality-low")
        })?;

        if recognized.confidence < self.thresholds.min_ocr_confidence
            || !quality::page_ok(&recognized.text, &self.thresholds)
        {
            return Err(reject("ocr-quality-low"));
        }

        Ok(ExtractedDocument {
            text: recognized.text,
            page_count: 1,
            ocr_confidence: Some(recognized.confidence),
            method: ExtractionMethod::ImageOcr,
        })
    }
}

/// What to do after the embedded-extraction quality gate.
#[derive(Debug, PartialEq, Eq)]
enum PdfPlan {
    AcceptEmbedded,
    RunOcr,
    /// Embedded text failed the gate and no OCR engine exists
    RejectDegraded,
}

fn embedded_plan(page_flags: &[bool], ocr_available: bool, t: &QualityThresholds) -> PdfPlan {
    if quality::good_fraction(page_flags) >= t.good_page_fraction {
        PdfPlan::AcceptEmbedded
    } else if ocr_available {
        PdfPlan::RunOcr
    } else {
        PdfPlan::RejectDegraded
    }
}

/// Accept/reject after the OCR fallback pass.
fn fallback_verdict(
    page_flags: &[bool],
    confidence: Option<f32>,
    t: &QualityThresholds,
) -> Result<(), ExtractReject> {
    let Some(confidence) = confidence else {
        // No page survived render + recognize
        return Err(reject("ocr-quality-low"));
    };
    if confidence < t.min_ocr_confidence {
        return Err(reject("ocr-quality-low"));
    }
    if quality::good_fraction(page_flags) < t.good_page_fraction {
        return Err(reject("ocr-quality-low"));
    }
    Ok(())
}

fn mean_confidence(confidences: &[f32]) -> Option<f32> {
    if confidences.is_empty() {
        return None;
    }
    Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
}

fn join_pages(texts: &[String]) -> String {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
