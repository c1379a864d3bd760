//! Language and title validation over extracted text
//!
//! Two independent gates: the document must read as the requested
//! language, and the candidate title must plausibly appear in it. Both
//! are conservative — uncertain detection passes, because children's
//! books are short and full of names the detector chokes on.

use whatlang::Lang;

/// Why a document was rejected after successful extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReject {
    LanguageMismatch,
    TitleMismatch,
    TooShort,
}

impl FilterReject {
    /// Stable label used as the cache failure reason.
    pub fn reason(self) -> &'static str {
        match self {
            Self::LanguageMismatch => "language-mismatch",
            Self::TitleMismatch => "title-mismatch",
            Self::TooShort => "content-too-short",
        }
    }
}

pub struct LanguageFilter {
    target: Option<Lang>,
    min_language_confidence: f64,
    min_title_similarity: f64,
    min_content_chars: usize,
}

/// Snippet length for the title-similarity sequence check
const TITLE_SNIPPET_CHARS: usize = 500;

/// Paragraphs shorter than this are headers/page numbers, always kept
const SHORT_BLOCK_CHARS: usize = 100;

/// Confidence needed before a paragraph is dropped as foreign
const PARAGRAPH_DROP_CONFIDENCE: f64 = 0.8;

impl LanguageFilter {
    pub fn new(
        language: &str,
        min_language_confidence: f64,
        min_title_similarity: f64,
        min_content_chars: usize,
    ) -> Self {
        let target = target_lang(language);
        if target.is_none() {
            log::warn!("unknown language '{language}': language checks disabled for this run");
        }
        Self {
            target,
            min_language_confidence,
            min_title_similarity,
            min_content_chars,
        }
    }

    /// Validate an extracted document against the candidate title.
    /// Either rejection short-circuits the other checks.
    pub fn check(&self, title: &str, text: &str) -> Result<(), FilterReject> {
        if meaningful_chars(text) < self.min_content_chars {
            return Err(FilterReject::TooShort);
        }

        if let Some(target) = self.target {
            if let Some(info) = whatlang::detect(text) {
                if info.lang() != target && info.confidence() >= self.min_language_confidence {
                    return Err(FilterReject::LanguageMismatch);
                }
            }
        }

        if title_similarity(title, text) < self.min_title_similarity {
            return Err(FilterReject::TitleMismatch);
        }

        Ok(())
    }

    /// Refinement pass applied before a document is emitted: drop
    /// paragraphs confidently in the wrong language, then trim foreign
    /// words from the edges (scan covers, library stamps).
    pub fn refine(&self, text: &str) -> String {
        let Some(target) = self.target else {
            return text.to_string();
        };
        let filtered = filter_paragraphs(text, target);
        trim_foreign_edges(&filtered, target)
    }
}

/// Combined title/content similarity after case and diacritic folding:
/// weighted toward direct word matches, with whole-string similarity
/// against the opening snippet as a tiebreaker.
pub fn title_similarity(title: &str, text: &str) -> f64 {
    let title_folded = fold(title);
    let text_folded = fold(text);
    if title_folded.is_empty() || text_folded.is_empty() {
        return 0.0;
    }

    let title_words: Vec<&str> = title_folded.split_whitespace().collect();
    let matched = title_words
        .iter()
        .filter(|w| text_folded.contains(*w))
        .count();
    let word_ratio = matched as f64 / title_words.len() as f64;

    let snippet: String = text_folded.chars().take(TITLE_SNIPPET_CHARS).collect();
    let sequence = similar::TextDiff::from_chars(title_folded.as_str(), snippet.as_str()).ratio() as f64;

    (word_ratio * 0.7) + (sequence * 0.3)
}

/// Letters, digits, whitespace, and basic punctuation.
fn meaningful_chars(text: &str) -> usize {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,!?;:-()[]{}'\"".contains(*c))
        .count()
}

/// Lowercase and fold common diacritics so "Pinocchio" matches "PINOCCHIO"
/// and "héros" matches "heros".
fn fold(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.to_lowercase().chars() {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => out.push('a'),
            'è' | 'é' | 'ê' | 'ë' => out.push('e'),
            'ì' | 'í' | 'î' | 'ï' => out.push('i'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => out.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
            'ý' | 'ÿ' => out.push('y'),
            'ç' => out.push('c'),
            'ñ' => out.push('n'),
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'œ' => out.push_str("oe"),
            c => out.push(c),
        }
    }
    out
}

/// Keep paragraphs unless detection is confident they are foreign.
fn filter_paragraphs(text: &str, target: Lang) -> String {
    let kept: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| {
            if p.chars().count() < SHORT_BLOCK_CHARS {
                return true;
            }
            match whatlang::detect(p) {
                Some(info) => {
                    info.lang() == target || info.confidence() < PARAGRAPH_DROP_CONFIDENCE
                }
                None => true,
            }
        })
        .collect();
    kept.join("\n\n")
}

/// Trim leading/trailing words that are confidently foreign (scanner
/// artifacts, library stamps, English boilerplate around the story).
/// Single-word detection is noisy, so only high-confidence verdicts trim.
fn trim_foreign_edges(text: &str, target: Lang) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 10 {
        return text.to_string();
    }

    let is_foreign = |word: &&str| -> bool {
        if word.chars().count() < 3 || !word.chars().any(|c| c.is_alphabetic()) {
            return false;
        }
        whatlang::detect(word).is_some_and(|info| {
            info.lang() != target && info.confidence() >= PARAGRAPH_DROP_CONFIDENCE
        })
    };

    let start = words
        .iter()
        .take(20)
        .position(|w| !is_foreign(w))
        .unwrap_or(0);
    let end = words
        .iter()
        .rev()
        .take(20)
        .position(|w| !is_foreign(w))
        .map_or(words.len(), |from_end| words.len() - from_end);

    if start < end {
        words[start..end].join(" ")
    } else {
        text.to_string()
    }
}

/// Language name → whatlang target, per the languages the trainer offers.
fn target_lang(language_name: &str) -> Option<Lang> {
    let code = match language_name.to_lowercase().as_str() {
        "english" => "eng",
        "french" => "fra",
        "spanish" => "spa",
        "german" => "deu",
        "italian" => "ita",
        "portuguese" => "por",
        "russian" => "rus",
        "dutch" => "nld",
        "swedish" => "swe",
        "norwegian" => "nob",
        "danish" => "dan",
        "finnish" => "fin",
        "polish" => "pol",
        "czech" => "ces",
        "hungarian" => "hun",
        "turkish" => "tur",
        "greek" => "ell",
        "arabic" => "ara",
        "hebrew" => "heb",
        "hindi" => "hin",
        "bengali" => "ben",
        "tamil" => "tam",
        "thai" => "tha",
        "chinese" => "cmn",
        "japanese" => "jpn",
        "korean" => "kor",
        _ => return None,
    };
    Lang::from_code(code)
}
