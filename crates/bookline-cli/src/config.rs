//! Configuration loading from TOML files

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for bookline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub acquire: AcquireSection,
    pub extract: ExtractSection,
    pub cache: CacheSection,
    pub titles: TitlesSection,
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquireSection {
    pub language: String,
    pub count: usize,
    pub workers: usize,
    pub output_dir: PathBuf,
    pub min_language_confidence: f64,
    pub min_title_similarity: f64,
    pub min_content_chars: usize,
}

impl Default for AcquireSection {
    fn default() -> Self {
        Self {
            language: "french".to_string(),
            count: 10,
            workers: 4,
            output_dir: PathBuf::from("./books"),
            min_language_confidence: 0.5,
            min_title_similarity: 0.45,
            min_content_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractSection {
    pub plain_text_printable: f64,
    pub page_printable: f64,
    pub words_per_page: usize,
    pub good_page_fraction: f64,
    pub min_ocr_confidence: f32,
    pub max_pages: usize,
    pub ocr_max_pages: usize,
    /// Record scanned-book failures even when no OCR engine is installed
    pub cache_degraded_failures: bool,
}

impl Default for ExtractSection {
    fn default() -> Self {
        let t = bookline_extract::QualityThresholds::default();
        Self {
            plain_text_printable: t.plain_text_printable,
            page_printable: t.page_printable,
            words_per_page: t.words_per_page,
            good_page_fraction: t.good_page_fraction,
            min_ocr_confidence: t.min_ocr_confidence,
            max_pages: 10,
            ocr_max_pages: 5,
            cache_degraded_failures: false,
        }
    }
}

impl ExtractSection {
    pub fn thresholds(&self) -> bookline_extract::QualityThresholds {
        bookline_extract::QualityThresholds {
            plain_text_printable: self.plain_text_printable,
            page_printable: self.page_printable,
            words_per_page: self.words_per_page,
            good_page_fraction: self.good_page_fraction,
            min_ocr_confidence: self.min_ocr_confidence,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Local tier root
    pub dir: PathBuf,
    /// Failed-entry TTL in days (success entries never expire)
    pub ttl_days: i64,
    /// S3-compatible endpoint; unset = local-only caching
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub access_key: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub secret_key: Option<String>,
}

impl Default for CacheSection {
    fn default() -> Self {
        let dir = directories::ProjectDirs::from("", "", "bookline")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".bookline/cache"));
        Self {
            dir,
            ttl_days: 14,
            endpoint: None,
            region: "us-east-1".to_string(),
            bucket: "bookline".to_string(),
            access_key: None,
            secret_key: std::env::var("BOOKLINE_S3_SECRET_KEY").ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TitlesSection {
    /// Title suggestion endpoint: GET ?language=&count= → JSON list
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Whole-request timeout in seconds for a single fetch attempt
    pub request_timeout: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            request_timeout: 60,
            max_retries: 3,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./bookline.toml (current directory)
    /// 2. ~/.config/bookline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("bookline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "bookline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.acquire.language, "french");
        assert_eq!(config.cache.ttl_days, 14);
        assert!(config.cache.endpoint.is_none());
        assert!(config.acquire.workers >= 1);
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[acquire]
language = "german"
workers = 3

[cache]
ttl_days = 30
endpoint = "https://s3.wasabisys.com"
bucket = "typertrs"
access_key = "AKEXAMPLE"

[extract]
min_ocr_confidence = 0.7
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.acquire.language, "german");
        assert_eq!(config.acquire.workers, 3);
        assert_eq!(config.cache.ttl_days, 30);
        assert_eq!(config.cache.bucket, "typertrs");
        assert_eq!(config.cache.access_key.as_deref(), Some("AKEXAMPLE"));
        assert_eq!(config.extract.min_ocr_confidence, 0.7);
        // Untouched sections keep defaults
        assert_eq!(config.acquire.count, 10);
    }

    #[test]
    fn thresholds_roundtrip() {
        let section = ExtractSection::default();
        let t = section.thresholds();
        assert_eq!(t.words_per_page, 20);
    }
}
