//! Bookline Extract - turns fetched bytes into usable practice text
//!
//! Explicit two-stage state machine: embedded extraction → quality gate →
//! OCR fallback → quality gate → accept/reject. The OCR engine is an
//! optional capability probed at startup; without it the pipeline runs in
//! embedded-text-only mode.

pub mod kind;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod quality;

// Re-exports for convenience
pub use kind::ContentKind;
pub use ocr::{OcrEngine, OcrError, OcrText, Tesseract};
pub use pdf::{PdfDocument, PdfError, poppler_available};
pub use pipeline::{ExtractReject, ExtractedDocument, ExtractionMethod, ExtractionPipeline};
pub use quality::QualityThresholds;
