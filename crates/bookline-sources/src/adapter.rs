//! SourceAdapter: uniform fetch contract over one download source

use bookline_core::HttpError;

/// Raw content fetched from one source for one title.
///
/// Owned exclusively by a single downloader invocation and discarded
/// after extraction.
#[derive(Debug)]
pub struct FetchResult {
    /// Adapter that produced this result (provenance)
    pub adapter: &'static str,
    pub bytes: Vec<u8>,
    /// What the source claims the content is, if it says anything
    pub mime_hint: Option<&'static str>,
    /// Where the content actually came from (provenance)
    pub source_url: String,
}

/// Failure from one adapter attempt.
#[derive(Debug)]
pub enum FetchError {
    Http(HttpError),
    /// The source responded, but its payload was unusable (bad JSON,
    /// truncated download, suspicious page)
    BadPayload(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "{e}"),
            Self::BadPayload(msg) => write!(f, "bad payload: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<HttpError> for FetchError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

impl bookline_core::Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_retryable(),
            Self::BadPayload(_) => false,
        }
    }
}

impl FetchError {
    /// Short stable label used as a cache failure reason.
    pub fn reason_label(&self) -> String {
        match self {
            Self::Http(e) => e.reason_label(),
            Self::BadPayload(_) => "bad-payload".to_string(),
        }
    }
}

/// One download source behind a uniform contract.
///
/// `Ok(None)` means the source has no match for this title, not an
/// error, the downloader just moves to the next adapter.
pub trait SourceAdapter: Send + Sync {
    fn id(&self) -> &'static str;
    fn fetch(&self, title: &str, language: &str) -> Result<Option<FetchResult>, FetchError>;
}

/// Score a candidate result title against the requested title:
/// equal parts whole-string similarity and word overlap, clamped to [0, 1].
pub fn title_score(expected: &str, candidate: &str) -> f64 {
    let expected_lower = expected.to_lowercase();
    let candidate_lower = candidate.to_lowercase();

    let ratio = similar::TextDiff::from_chars(expected_lower.as_str(), candidate_lower.as_str())
        .ratio() as f64;

    let expected_words: Vec<&str> = expected_lower.split_whitespace().collect();
    let overlap = if expected_words.is_empty() {
        0.0
    } else {
        let matched = expected_words
            .iter()
            .filter(|w| candidate_lower.split_whitespace().any(|c| c == **w))
            .count();
        matched as f64 / expected_words.len() as f64
    };

    ((ratio * 0.5) + (overlap * 0.5)).clamp(0.0, 1.0)
}
