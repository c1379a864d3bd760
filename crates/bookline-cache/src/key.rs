//! TitleKey: normalized cache identity for a (title, language) pair

/// Normalized identity under which a title's outcome is cached.
///
/// Two titles differing only in casing, whitespace, or punctuation must
/// collide to the same key so entries written by other instances are found.
/// Diacritics are preserved: "héros" and "heros" are different words.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TitleKey {
    language: String,
    normalized: String,
    hash: String,
}

impl TitleKey {
    pub fn new(title: &str, language: &str) -> Self {
        let language = normalize(language);
        let normalized = normalize(title);
        let hash = blake3::hash(format!("{language}\n{normalized}").as_bytes())
            .to_hex()
            .to_string();
        Self {
            language,
            normalized,
            hash,
        }
    }

    /// Normalized language name (lowercase, e.g. "french")
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Normalized title text
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Full blake3 hex hash of (language, normalized title)
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Storage key used identically by both cache tiers:
    /// `<language>/<title-key-hash>.json`
    pub fn object_key(&self) -> String {
        format!("{}/{}.json", self.language, self.hash)
    }
}

impl std::fmt::Display for TitleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.normalized, self.language)
    }
}

/// Case-fold, map punctuation/separators to spaces, collapse whitespace.
fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            out.extend(c.to_lowercase());
            pending_space = false;
        } else {
            pending_space = true;
        }
    }
    out
}
