//! Quality gates over extracted text
//!
//! The same gates run after embedded extraction and after OCR fallback;
//! only the thresholds are configuration.

/// Named, configurable thresholds for every quality decision.
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    /// Minimum printable-character ratio for plain-text content
    pub plain_text_printable: f64,
    /// Minimum printable-character ratio for one PDF page to count as readable
    pub page_printable: f64,
    /// Minimum words on one PDF page to count as readable
    pub words_per_page: usize,
    /// Minimum fraction of readable pages for a document to pass
    pub good_page_fraction: f64,
    /// Minimum mean OCR engine confidence (0–1)
    pub min_ocr_confidence: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            plain_text_printable: 0.5,
            page_printable: 0.6,
            words_per_page: 20,
            good_page_fraction: 0.5,
            min_ocr_confidence: 0.55,
        }
    }
}

/// Fraction of characters that are letters, digits, or whitespace.
/// Scanned-garbage extractions are dominated by symbols and control bytes.
pub fn printable_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let printable = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .count();
    printable as f64 / total as f64
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Per-page readability gate: printable ratio and word density together.
pub fn page_ok(text: &str, thresholds: &QualityThresholds) -> bool {
    printable_ratio(text) >= thresholds.page_printable
        && word_count(text) >= thresholds.words_per_page
}

/// Fraction of pages passing the per-page gate.
pub fn good_fraction(page_flags: &[bool]) -> f64 {
    if page_flags.is_empty() {
        return 0.0;
    }
    page_flags.iter().filter(|ok| **ok).count() as f64 / page_flags.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_ratio_clean_text() {
        let ratio = printable_ratio("Il était une fois un petit prince");
        assert!(ratio > 0.95, "got {ratio}");
    }

    #[test]
    fn printable_ratio_garbage() {
        let ratio = printable_ratio("\u{fffd}\u{fffd}#$%^&*()\u{fffd}\u{fffd}@@!!");
        assert!(ratio < 0.2, "got {ratio}");
    }

    #[test]
    fn printable_ratio_empty() {
        assert_eq!(printable_ratio(""), 0.0);
    }

    #[test]
    fn page_ok_requires_both_gates() {
        let t = QualityThresholds::default();
        let readable = "une phrase simple et claire ".repeat(10);
        assert!(page_ok(&readable, &t));

        // Enough words, but symbol soup
        let noisy = "@# $% ^& *! (( )) == ++ ~~ ".repeat(10);
        assert!(!page_ok(&noisy, &t));

        // Clean, but too sparse to be a real page
        assert!(!page_ok("juste trois mots", &t));
    }

    #[test]
    fn good_fraction_counts() {
        assert_eq!(good_fraction(&[true, true, false, false]), 0.5);
        assert_eq!(good_fraction(&[true]), 1.0);
        assert_eq!(good_fraction(&[]), 0.0);
    }

    #[test]
    fn default_thresholds_in_range() {
        let t = QualityThresholds::default();
        assert!(t.plain_text_printable > 0.0 && t.plain_text_printable < 1.0);
        assert!(t.good_page_fraction > 0.0 && t.good_page_fraction <= 1.0);
        assert!(t.min_ocr_confidence > 0.0 && t.min_ocr_confidence < 1.0);
    }
}
