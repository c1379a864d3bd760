//! Content-kind detection from fetched bytes
//!
//! Magic bytes first (sources lie about mime types), then the adapter's
//! hint, then a printable-text heuristic.

use crate::quality::printable_ratio;

/// Content categories the extraction pipeline knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    PlainText,
    Pdf,
    Image,
}

/// Sniffed-text sample size: enough to judge without scanning a whole book
const TEXT_SNIFF_BYTES: usize = 8 * 1024;

pub fn detect(bytes: &[u8], mime_hint: Option<&str>) -> Option<ContentKind> {
    if let Some(kind) = infer::get(bytes) {
        let mime = kind.mime_type();
        if mime == "application/pdf" {
            return Some(ContentKind::Pdf);
        }
        if mime.starts_with("image/") {
            return Some(ContentKind::Image);
        }
        // Known but unusable container (zip, audio, ...)
        return None;
    }

    if let Some(hint) = mime_hint {
        if hint.contains("pdf") {
            return Some(ContentKind::Pdf);
        }
        if hint.starts_with("image/") {
            return Some(ContentKind::Image);
        }
        if hint.starts_with("text/") {
            return Some(ContentKind::PlainText);
        }
    }

    looks_like_text(bytes).then_some(ContentKind::PlainText)
}

/// No NUL bytes and a high printable ratio in the leading sample.
fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let sample = &bytes[..bytes.len().min(TEXT_SNIFF_BYTES)];
    if sample.contains(&0) {
        return false;
    }
    printable_ratio(&String::from_utf8_lossy(sample)) >= 0.6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_magic() {
        let bytes = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj";
        assert_eq!(detect(bytes, None), Some(ContentKind::Pdf));
    }

    #[test]
    fn magic_beats_wrong_hint() {
        let bytes = b"%PDF-1.4\nsome pdf body";
        assert_eq!(detect(bytes, Some("text/plain")), Some(ContentKind::Pdf));
    }

    #[test]
    fn detects_png_magic() {
        let bytes = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
        assert_eq!(detect(bytes, None), Some(ContentKind::Image));
    }

    #[test]
    fn plain_utf8_is_text() {
        let bytes = "Il était une fois un petit prince.\n".repeat(10);
        assert_eq!(detect(bytes.as_bytes(), None), Some(ContentKind::PlainText));
    }

    #[test]
    fn hint_used_when_no_magic() {
        assert_eq!(
            detect(b"anything readable", Some("text/plain; charset=utf-8")),
            Some(ContentKind::PlainText)
        );
    }

    #[test]
    fn binary_without_magic_rejected() {
        let bytes: Vec<u8> = vec![0u8, 1, 2, 3, 4, 5, 0, 0, 7, 8];
        assert_eq!(detect(&bytes, None), None);
    }

    #[test]
    fn zip_container_rejected() {
        let bytes = b"PK\x03\x04rest of zip";
        assert_eq!(detect(bytes, None), None);
    }

    #[test]
    fn empty_rejected() {
        assert_eq!(detect(b"", None), None);
    }
}
