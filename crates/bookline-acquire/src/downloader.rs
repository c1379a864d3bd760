//! Downloader: runs one candidate title through sources, extraction,
//! and validation
//!
//! Adapter- and extraction-level errors are converted to outcome/reason
//! pairs here; nothing below this boundary aborts the run.

use bookline_core::http::http_config;
use bookline_core::{is_shutdown_requested, retry_with_backoff};
use bookline_extract::ExtractionPipeline;
use bookline_sources::{FetchResult, SourceAdapter};
use indicatif::ProgressBar;

use crate::language::LanguageFilter;
use crate::output::{FinishedDocument, Provenance};
use crate::titles::CandidateTitle;

/// Final state of one title after a downloader invocation.
#[derive(Debug)]
pub enum TitleOutcome {
    Success(FinishedDocument),
    Failed {
        reason: String,
        /// Degraded-capability failures are only cached when configured
        cacheable: bool,
    },
    /// Shutdown observed mid-flight; must not be recorded in any tier
    Aborted,
}

pub struct Downloader<'a> {
    adapters: &'a [Box<dyn SourceAdapter>],
    pipeline: &'a ExtractionPipeline,
    cache_degraded_failures: bool,
}

impl<'a> Downloader<'a> {
    pub fn new(
        adapters: &'a [Box<dyn SourceAdapter>],
        pipeline: &'a ExtractionPipeline,
        cache_degraded_failures: bool,
    ) -> Self {
        Self {
            adapters,
            pipeline,
            cache_degraded_failures,
        }
    }

    /// Try each adapter in priority order; the first non-empty fetch wins
    /// and its content flows through extraction and validation. Downstream
    /// rejections are the title's outcome; the adapter already succeeded
    /// at transport.
    pub fn run(
        &self,
        candidate: &CandidateTitle,
        filter: &LanguageFilter,
        pb: &ProgressBar,
    ) -> TitleOutcome {
        let mut last_failure: Option<String> = None;

        for adapter in self.adapters {
            if is_shutdown_requested() {
                return TitleOutcome::Aborted;
            }
            pb.set_message(format!("searching {}", adapter.id()));

            let label = format!("{}: {}", adapter.id(), candidate.title);
            let attempt = retry_with_backoff(&label, http_config().max_retries, || {
                adapter.fetch(&candidate.title, &candidate.language)
            });

            match attempt {
                Ok(Some(fetched)) => return self.process(candidate, fetched, filter, pb),
                Ok(None) => {
                    log::debug!("{}: no match for '{}'", adapter.id(), candidate.title);
                }
                Err(e) => {
                    log::debug!("{}: '{}' failed: {e}", adapter.id(), candidate.title);
                    last_failure = Some(e.reason_label());
                }
            }
        }

        TitleOutcome::Failed {
            reason: last_failure.unwrap_or_else(|| "all-sources-exhausted".to_string()),
            cacheable: true,
        }
    }

    fn process(
        &self,
        candidate: &CandidateTitle,
        fetched: FetchResult,
        filter: &LanguageFilter,
        pb: &ProgressBar,
    ) -> TitleOutcome {
        if is_shutdown_requested() {
            return TitleOutcome::Aborted;
        }
        pb.set_message(format!("extracting ({})", fetched.adapter));

        let extracted = match self.pipeline.extract(&fetched.bytes, fetched.mime_hint) {
            Ok(doc) => doc,
            Err(reject) => {
                return TitleOutcome::Failed {
                    reason: reject.reason.to_string(),
                    cacheable: !reject.degraded || self.cache_degraded_failures,
                };
            }
        };

        if is_shutdown_requested() {
            return TitleOutcome::Aborted;
        }
        pb.set_message("validating");

        let text = filter.refine(&extracted.text);
        if let Err(reject) = filter.check(&candidate.title, &text) {
            return TitleOutcome::Failed {
                reason: reject.reason().to_string(),
                cacheable: true,
            };
        }

        TitleOutcome::Success(FinishedDocument {
            title: candidate.title.clone(),
            language: candidate.language.clone(),
            text,
            provenance: Provenance {
                adapter: fetched.adapter,
                method: extracted.method,
                source_url: fetched.source_url,
                ocr_confidence: extracted.ocr_confidence,
            },
        })
    }
}
