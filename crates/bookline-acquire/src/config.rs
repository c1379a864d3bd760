//! Acquisition run configuration

use std::path::PathBuf;

use bookline_extract::QualityThresholds;

/// Runtime configuration for one acquisition run. Every tuning parameter
/// the pipeline consults lives here, not in constants.
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    pub language: String,
    /// Titles requested from the suggestion source
    pub count: usize,
    /// Worker pool size, kept small to respect source rate limits
    pub workers: usize,
    /// Where finished documents are written for the practice session
    pub output_dir: PathBuf,
    /// Record degraded-capability extraction failures in the cache
    pub cache_degraded_failures: bool,
    pub thresholds: QualityThresholds,
    pub min_language_confidence: f64,
    pub min_title_similarity: f64,
    pub min_content_chars: usize,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            language: "french".to_string(),
            count: 10,
            workers: 4,
            output_dir: PathBuf::from("./books"),
            cache_degraded_failures: false,
            thresholds: QualityThresholds::default(),
            min_language_confidence: 0.5,
            min_title_similarity: 0.45,
            min_content_chars: 500,
        }
    }
}
