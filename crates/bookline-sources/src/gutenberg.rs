//! Project Gutenberg adapter
//!
//! Queries the Gutendex API and downloads the best-matching book's plain
//! text. Gutenberg serves clean UTF-8 text, so hits here skip the whole
//! PDF/OCR path.

use bookline_core::http::{get_bytes, get_text};

use crate::adapter::{FetchError, FetchResult, SourceAdapter, title_score};

/// Downloads smaller than this are error pages, not books
const MIN_TEXT_BYTES: usize = 512;

pub struct Gutenberg {
    base: String,
}

#[derive(Debug)]
struct BookHit {
    score: f64,
    text_url: String,
}

impl Gutenberg {
    pub fn new() -> Self {
        Self {
            base: "https://gutendex.com".to_string(),
        }
    }
}

impl Default for Gutenberg {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for Gutenberg {
    fn id(&self) -> &'static str {
        "gutenberg"
    }

    fn fetch(&self, title: &str, language: &str) -> Result<Option<FetchResult>, FetchError> {
        let mut url = format!("{}/books?search={}", self.base, urlencoding::encode(title));
        if let Some(code) = iso639_1(language) {
            url.push_str(&format!("&languages={code}"));
        }

        let body = get_text(&url)?;
        let mut hits = parse_books(&body, title)?;
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let Some(best) = hits.into_iter().next() else {
            return Ok(None);
        };

        let bytes = get_bytes(&best.text_url)?;
        if bytes.len() < MIN_TEXT_BYTES {
            return Err(FetchError::BadPayload(format!(
                "download too small ({} bytes)",
                bytes.len()
            )));
        }

        Ok(Some(FetchResult {
            adapter: self.id(),
            bytes,
            mime_hint: Some("text/plain"),
            source_url: best.text_url,
        }))
    }
}

/// Parse a Gutendex response, keeping only results with a usable
/// plain-text format.
fn parse_books(body: &str, expected_title: &str) -> Result<Vec<BookHit>, FetchError> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| FetchError::BadPayload(format!("gutendex JSON: {e}")))?;
    let results = parsed["results"]
        .as_array()
        .ok_or_else(|| FetchError::BadPayload("no results array".to_string()))?;

    let mut hits = Vec::new();
    for book in results {
        let Some(book_title) = book["title"].as_str() else {
            continue;
        };
        let Some(text_url) = plain_text_url(&book["formats"]) else {
            continue;
        };
        hits.push(BookHit {
            score: title_score(expected_title, book_title),
            text_url,
        });
    }
    Ok(hits)
}

/// Pick a text/plain format URL, preferring UTF-8 and skipping archives.
fn plain_text_url(formats: &serde_json::Value) -> Option<String> {
    let map = formats.as_object()?;
    let mut fallback = None;
    for (mime, url) in map {
        if !mime.starts_with("text/plain") {
            continue;
        }
        let Some(url) = url.as_str() else {
            continue;
        };
        if url.ends_with(".zip") {
            continue;
        }
        if mime.contains("utf-8") {
            return Some(url.to_string());
        }
        fallback.get_or_insert_with(|| url.to_string());
    }
    fallback
}

/// Language name → ISO 639-1 code for the Gutendex languages filter.
/// Unknown names just search without the filter.
fn iso639_1(language_name: &str) -> Option<&'static str> {
    match language_name.to_lowercase().as_str() {
        "english" => Some("en"),
        "french" => Some("fr"),
        "spanish" => Some("es"),
        "german" => Some("de"),
        "italian" => Some("it"),
        "portuguese" => Some("pt"),
        "russian" => Some("ru"),
        "dutch" => Some("nl"),
        "swedish" => Some("sv"),
        "norwegian" => Some("no"),
        "danish" => Some("da"),
        "finnish" => Some("fi"),
        "polish" => Some("pl"),
        "czech" => Some("cs"),
        "hungarian" => Some("hu"),
        "turkish" => Some("tr"),
        "greek" => Some("el"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "results": [
            {
                "title": "Le petit prince",
                "formats": {
                    "text/plain; charset=utf-8": "https://www.gutenberg.org/files/1/1-0.txt",
                    "application/epub+zip": "https://www.gutenberg.org/ebooks/1.epub"
                }
            },
            {
                "title": "Le grand dictionnaire",
                "formats": {
                    "text/plain; charset=us-ascii": "https://www.gutenberg.org/files/2/2.txt"
                }
            },
            {
                "title": "Le petit prince (audio)",
                "formats": {
                    "audio/mpeg": "https://www.gutenberg.org/files/3/3.mp3"
                }
            }
        ]
    }"#;

    #[test]
    fn parses_books_with_text_formats() {
        let hits = parse_books(SAMPLE, "Le Petit Prince").unwrap();
        // The audio-only result has no usable format
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn best_hit_is_exact_title() {
        let mut hits = parse_books(SAMPLE, "Le Petit Prince").unwrap();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        assert_eq!(hits[0].text_url, "https://www.gutenberg.org/files/1/1-0.txt");
    }

    #[test]
    fn prefers_utf8_over_ascii() {
        let formats = serde_json::json!({
            "text/plain; charset=us-ascii": "https://example.com/ascii.txt",
            "text/plain; charset=utf-8": "https://example.com/utf8.txt"
        });
        assert_eq!(
            plain_text_url(&formats).as_deref(),
            Some("https://example.com/utf8.txt")
        );
    }

    #[test]
    fn skips_zip_archives() {
        let formats = serde_json::json!({
            "text/plain; charset=utf-8": "https://example.com/book.zip"
        });
        assert!(plain_text_url(&formats).is_none());
    }

    #[test]
    fn rejects_bad_json() {
        assert!(parse_books("not json", "x").is_err());
        assert!(parse_books("{}", "x").is_err());
    }

    #[test]
    fn language_codes() {
        assert_eq!(iso639_1("French"), Some("fr"));
        assert_eq!(iso639_1("GERMAN"), Some("de"));
        assert_eq!(iso639_1("klingon"), None);
    }
}
