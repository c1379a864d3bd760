//! Cache entry records: per-title outcome with TTL-based expiry

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Final outcome of an acquisition attempt for one title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// One cached record, serialized as JSON in both tiers.
///
/// `failed` entries expire after the configured TTL (sources change, books
/// get uploaded); `success` entries never expire: a book already obtained
/// must never be re-attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Normalized title text (the TitleKey input, kept for listings/export)
    pub title: String,
    /// Normalized language name
    pub language: String,
    pub outcome: Outcome,
    /// Free-form reason, e.g. "http-404", "ocr-quality-low", "language-mismatch"
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
    pub attempts: u32,
}

impl CacheEntry {
    /// Whether the entry still counts at `now`. Expired entries are
    /// reported as absent by lookups regardless of tier.
    pub fn is_valid_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match self.outcome {
            Outcome::Success => true,
            Outcome::Failed => now - self.recorded_at < ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(outcome: Outcome, recorded_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            title: "le petit prince".to_string(),
            language: "french".to_string(),
            outcome,
            reason: "http-404".to_string(),
            recorded_at,
            attempts: 1,
        }
    }

    #[test]
    fn failed_valid_within_ttl() {
        let t = Utc::now();
        let e = entry(Outcome::Failed, t);
        assert!(e.is_valid_at(Duration::days(14), t));
        assert!(e.is_valid_at(Duration::days(14), t + Duration::days(13)));
    }

    #[test]
    fn failed_absent_at_ttl_boundary() {
        let t = Utc::now();
        let e = entry(Outcome::Failed, t);
        assert!(!e.is_valid_at(Duration::days(14), t + Duration::days(14)));
        assert!(!e.is_valid_at(Duration::days(14), t + Duration::days(365)));
    }

    #[test]
    fn success_never_expires() {
        let t = Utc::now();
        let e = entry(Outcome::Success, t);
        assert!(e.is_valid_at(Duration::days(14), t + Duration::days(10_000)));
    }

    #[test]
    fn json_roundtrip() {
        let e = entry(Outcome::Failed, Utc::now());
        let json = serde_json::to_string(&e).unwrap();
        let back: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.title, e.title);
        assert_eq!(back.outcome, Outcome::Failed);
        assert_eq!(back.reason, "http-404");
        assert_eq!(back.attempts, 1);
    }

    #[test]
    fn outcome_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Outcome::Success).unwrap(), "\"success\"");
        assert_eq!(serde_json::to_string(&Outcome::Failed).unwrap(), "\"failed\"");
    }
}
