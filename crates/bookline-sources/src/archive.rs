//! Internet Archive adapter
//!
//! Searches the advancedsearch API with a few query strategies, ranks the
//! hits by title similarity, then scans the best detail pages for a PDF
//! download link.

use std::time::Duration;

use bookline_core::http::{get_bytes, get_text};

use crate::adapter::{FetchError, FetchResult, SourceAdapter, title_score};

/// Detail pages tried, best score first
const MAX_CANDIDATES: usize = 5;

/// Downloads smaller than this are error pages, not books
const MIN_PDF_BYTES: usize = 1024;

/// Politeness delay between consecutive search queries
const SEARCH_DELAY: Duration = Duration::from_millis(500);

pub struct InternetArchive {
    base: String,
}

#[derive(Debug)]
struct SearchHit {
    identifier: String,
    score: f64,
}

impl InternetArchive {
    pub fn new() -> Self {
        Self {
            base: "https://archive.org".to_string(),
        }
    }

    fn search(&self, title: &str, language: &str) -> Result<Vec<SearchHit>, FetchError> {
        let quoted = format!("\"{title}\"");
        let with_language = format!("{title} {language}");
        let strategies = [title, quoted.as_str(), with_language.as_str()];

        let mut hits: Vec<SearchHit> = Vec::new();
        let mut last_err: Option<FetchError> = None;

        for (i, query) in strategies.into_iter().enumerate() {
            if i > 0 {
                std::thread::sleep(SEARCH_DELAY);
            }
            let url = format!(
                "{}/advancedsearch.php?q={}&fl=identifier,title,mediatype&rows=20&page=1&output=json",
                self.base,
                urlencoding::encode(query)
            );
            match get_text(&url) {
                Ok(body) => match parse_search_response(&body, title) {
                    Ok(mut found) => hits.append(&mut found),
                    Err(e) => {
                        log::debug!("archive search '{query}' unparsable: {e}");
                        last_err = Some(e);
                    }
                },
                Err(e) => {
                    log::debug!("archive search '{query}' failed: {e}");
                    last_err = Some(e.into());
                }
            }
        }

        if hits.is_empty() {
            if let Some(e) = last_err {
                return Err(e);
            }
            return Ok(hits);
        }

        // Same identifier scores identically across strategies, so any
        // duplicate can be dropped
        hits.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        hits.dedup_by(|a, b| a.identifier == b.identifier);
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }
}

impl Default for InternetArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for InternetArchive {
    fn id(&self) -> &'static str {
        "internet-archive"
    }

    fn fetch(&self, title: &str, language: &str) -> Result<Option<FetchResult>, FetchError> {
        let hits = self.search(title, language)?;
        if hits.is_empty() {
            return Ok(None);
        }

        let mut last_err: Option<FetchError> = None;
        for hit in hits.iter().take(MAX_CANDIDATES) {
            let page_url = format!("{}/details/{}", self.base, hit.identifier);
            let html = match get_text(&page_url) {
                Ok(html) => html,
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            };
            if page_is_excluded(&html) {
                log::debug!("{}: skipping {} (comic/newspaper page)", self.id(), hit.identifier);
                continue;
            }
            let Some(pdf_url) = find_pdf_link(&html, &page_url) else {
                continue;
            };
            match get_bytes(&pdf_url) {
                Ok(bytes) if bytes.len() >= MIN_PDF_BYTES => {
                    return Ok(Some(FetchResult {
                        adapter: self.id(),
                        bytes,
                        mime_hint: Some("application/pdf"),
                        source_url: pdf_url,
                    }));
                }
                Ok(bytes) => {
                    last_err = Some(FetchError::BadPayload(format!(
                        "download too small ({} bytes)",
                        bytes.len()
                    )));
                }
                Err(e) => last_err = Some(e.into()),
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

/// Parse the advancedsearch JSON body into scored hits.
/// Fields can be strings or single-element arrays, depending on the doc.
fn parse_search_response(body: &str, expected_title: &str) -> Result<Vec<SearchHit>, FetchError> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| FetchError::BadPayload(format!("search JSON: {e}")))?;
    let docs = parsed["response"]["docs"]
        .as_array()
        .ok_or_else(|| FetchError::BadPayload("no response.docs array".to_string()))?;

    let mut hits = Vec::new();
    for doc in docs {
        let Some(identifier) = string_field(&doc["identifier"]) else {
            continue;
        };
        let Some(doc_title) = string_field(&doc["title"]) else {
            continue;
        };
        let mediatype = string_field(&doc["mediatype"]).unwrap_or_default();
        if mediatype != "texts" && mediatype != "data" {
            continue;
        }
        hits.push(SearchHit {
            identifier: identifier.to_string(),
            score: title_score(expected_title, doc_title),
        });
    }
    Ok(hits)
}

/// Accept both `"title": "x"` and `"title": ["x"]`
fn string_field(value: &serde_json::Value) -> Option<&str> {
    value
        .as_str()
        .or_else(|| value.as_array().and_then(|a| a.first()).and_then(|v| v.as_str()))
}

/// Comics and newspapers look like books in search but type terribly
fn page_is_excluded(html: &str) -> bool {
    let lower = html.to_lowercase();
    lower.contains("comic") || lower.contains("newspaper")
}

/// Scan an HTML page for the first link ending in .pdf
fn find_pdf_link(html: &str, page_url: &str) -> Option<String> {
    for line in html.lines() {
        let mut rest = line;
        while let Some(start) = rest.find("href=\"") {
            rest = &rest[start + 6..];
            let Some(end) = rest.find('"') else {
                break;
            };
            let href = &rest[..end];
            if href.to_lowercase().ends_with(".pdf") {
                return Some(resolve_href(page_url, href));
            }
            rest = &rest[end..];
        }
    }
    None
}

/// Join a possibly-relative href against the page URL
fn resolve_href(page_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    // scheme://host portion of the page URL
    let origin = page_url
        .find("://")
        .and_then(|scheme_end| {
            page_url[scheme_end + 3..]
                .find('/')
                .map(|host_end| &page_url[..scheme_end + 3 + host_end])
        })
        .unwrap_or(page_url);
    if href.starts_with('/') {
        return format!("{origin}{href}");
    }
    let dir = page_url.rsplit_once('/').map_or(page_url, |(dir, _)| dir);
    format!("{dir}/{href}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SEARCH: &str = r#"{
        "response": {
            "docs": [
                {"identifier": "lepetitprince00sain", "title": "Le petit prince", "mediatype": "texts"},
                {"identifier": "princemovie", "title": ["Le petit prince (film)"], "mediatype": ["movies"]},
                {"identifier": "somedata", "title": ["Le petit prince scans"], "mediatype": ["data"]},
                {"identifier": "unrelated", "title": "Thermodynamics", "mediatype": "texts"},
                {"title": "missing identifier", "mediatype": "texts"}
            ]
        }
    }"#;

    #[test]
    fn parse_search_filters_mediatype() {
        let hits = parse_search_response(SAMPLE_SEARCH, "Le Petit Prince").unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.identifier.as_str()).collect();
        assert!(ids.contains(&"lepetitprince00sain"));
        assert!(ids.contains(&"somedata"));
        assert!(!ids.contains(&"princemovie"));
    }

    #[test]
    fn parse_search_scores_relevance() {
        let hits = parse_search_response(SAMPLE_SEARCH, "Le Petit Prince").unwrap();
        let exact = hits.iter().find(|h| h.identifier == "lepetitprince00sain").unwrap();
        let wrong = hits.iter().find(|h| h.identifier == "unrelated").unwrap();
        assert!(exact.score > wrong.score);
    }

    #[test]
    fn parse_search_rejects_bad_json() {
        assert!(parse_search_response("<html>rate limited</html>", "x").is_err());
        assert!(parse_search_response("{}", "x").is_err());
    }

    #[test]
    fn finds_pdf_link_in_page() {
        let html = r#"
            <a href="/stream/lepetitprince00sain">Read online</a>
            <a href="/download/lepetitprince00sain/lepetitprince00sain.pdf">PDF</a>
            <a href="/download/lepetitprince00sain/lepetitprince00sain_djvu.txt">TXT</a>
        "#;
        let url = find_pdf_link(html, "https://archive.org/details/lepetitprince00sain");
        assert_eq!(
            url.as_deref(),
            Some("https://archive.org/download/lepetitprince00sain/lepetitprince00sain.pdf")
        );
    }

    #[test]
    fn pdf_link_case_insensitive() {
        let html = r#"<a href="/download/x/Book.PDF">PDF</a>"#;
        assert!(find_pdf_link(html, "https://archive.org/details/x").is_some());
    }

    #[test]
    fn no_pdf_link_returns_none() {
        let html = r#"<a href="/download/x/book.epub">EPUB</a>"#;
        assert!(find_pdf_link(html, "https://archive.org/details/x").is_none());
    }

    #[test]
    fn resolve_href_variants() {
        let page = "https://archive.org/details/item";
        assert_eq!(
            resolve_href(page, "https://ia800.us.archive.org/x.pdf"),
            "https://ia800.us.archive.org/x.pdf"
        );
        assert_eq!(
            resolve_href(page, "//ia800.us.archive.org/x.pdf"),
            "https://ia800.us.archive.org/x.pdf"
        );
        assert_eq!(
            resolve_href(page, "/download/item/x.pdf"),
            "https://archive.org/download/item/x.pdf"
        );
        assert_eq!(
            resolve_href(page, "x.pdf"),
            "https://archive.org/details/x.pdf"
        );
    }

    #[test]
    fn excludes_comic_and_newspaper_pages() {
        assert!(page_is_excluded("<p>A great Comic book</p>"));
        assert!(page_is_excluded("<p>historic newspaper scans</p>"));
        assert!(!page_is_excluded("<p>a children's story</p>"));
    }
}
