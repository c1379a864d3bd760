//! Candidate titles and the external title source
//!
//! The AI suggestion service is a black box: `{language, count}` in, an
//! ordered list of title strings out. A failure here aborts only the
//! current batch — the run aborts only when no candidates exist at all.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bookline_core::http::{get_text, http_config};
use bookline_core::retry_with_backoff;

/// Where a candidate came from (suggestion service vs. user input).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleOrigin {
    Suggested,
    UserProvided,
}

/// One title to attempt, consumed once per scheduler cycle.
#[derive(Debug, Clone)]
pub struct CandidateTitle {
    pub title: String,
    pub language: String,
    pub origin: TitleOrigin,
}

impl CandidateTitle {
    pub fn new(title: impl Into<String>, language: impl Into<String>, origin: TitleOrigin) -> Self {
        Self {
            title: title.into(),
            language: language.into(),
            origin,
        }
    }
}

/// Source of candidate titles.
pub trait TitleSource {
    fn suggest(&self, language: &str, count: usize) -> Result<Vec<String>>;
}

/// HTTP title endpoint: GET `{endpoint}?language=<l>&count=<n>`, response
/// is either a JSON array of strings or `{"titles": [...]}`.
pub struct HttpTitleSource {
    endpoint: String,
}

impl HttpTitleSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl TitleSource for HttpTitleSource {
    fn suggest(&self, language: &str, count: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}?language={}&count={count}",
            self.endpoint,
            urlencoding::encode(language)
        );
        let body = retry_with_backoff("title source", http_config().max_retries, || {
            get_text(&url)
        })
        .context("title source unreachable")?;
        let titles = parse_titles(&body).context("title source returned malformed JSON")?;
        Ok(titles.into_iter().take(count).collect())
    }
}

/// Titles from a local file, one per line. Blank lines and `#` comments
/// are skipped.
pub struct FileTitleSource {
    path: PathBuf,
}

impl FileTitleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TitleSource for FileTitleSource {
    fn suggest(&self, _language: &str, count: usize) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read titles file {}", self.path.display()))?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .take(count)
            .map(String::from)
            .collect())
    }
}

/// Accept both response shapes the suggestion endpoint is known to emit.
fn parse_titles(body: &str) -> Result<Vec<String>> {
    let parsed: serde_json::Value = serde_json::from_str(body)?;
    let array = parsed
        .as_array()
        .or_else(|| parsed["titles"].as_array())
        .context("neither a JSON array nor an object with 'titles'")?;
    Ok(array
        .iter()
        .filter_map(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_array() {
        let titles = parse_titles(r#"["Le Petit Prince", "Babar"]"#).unwrap();
        assert_eq!(titles, vec!["Le Petit Prince", "Babar"]);
    }

    #[test]
    fn parse_object_with_titles() {
        let titles = parse_titles(r#"{"titles": ["Heidi", " Momo "]}"#).unwrap();
        assert_eq!(titles, vec!["Heidi", "Momo"]);
    }

    #[test]
    fn parse_skips_non_strings_and_blanks() {
        let titles = parse_titles(r#"["Heidi", 42, "", null]"#).unwrap();
        assert_eq!(titles, vec!["Heidi"]);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(parse_titles("not json").is_err());
        assert!(parse_titles(r#"{"other": []}"#).is_err());
    }

    #[test]
    fn file_source_reads_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titles.txt");
        std::fs::write(&path, "# kids classics\nLe Petit Prince\n\nBabar\nHeidi\n").unwrap();

        let source = FileTitleSource::new(&path);
        let titles = source.suggest("french", 2).unwrap();
        assert_eq!(titles, vec!["Le Petit Prince", "Babar"]);
    }

    #[test]
    fn file_source_missing_file_errors() {
        let source = FileTitleSource::new("/nonexistent/titles.txt");
        assert!(source.suggest("french", 5).is_err());
    }
}
