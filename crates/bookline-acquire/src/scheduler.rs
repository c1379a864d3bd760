//! Acquisition scheduler: a bounded worker pool over the candidate list
//!
//! Per title: cache lookup first (a valid entry skips all network work),
//! then the downloader, then the outcome is recorded. Shutdown stops
//! dispatching immediately; titles aborted mid-flight are never recorded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use bookline_cache::{CacheCoordinator, Lookup, Outcome, TitleKey};
use bookline_core::{SharedProgress, WorkQueue, is_shutdown_requested, request_shutdown};
use bookline_extract::ExtractionPipeline;
use bookline_sources::SourceAdapter;

use crate::config::AcquireConfig;
use crate::downloader::{Downloader, TitleOutcome};
use crate::language::LanguageFilter;
use crate::output::DocumentWriter;
use crate::titles::CandidateTitle;

/// Acquisition run summary
#[derive(Debug, Default)]
pub struct Summary {
    pub total: usize,
    pub skipped_cached: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub aborted: usize,
    pub elapsed: std::time::Duration,
}

/// Run the acquisition pipeline over `candidates`.
pub fn run_acquisition(
    candidates: Vec<CandidateTitle>,
    cache: &CacheCoordinator,
    adapters: &[Box<dyn SourceAdapter>],
    pipeline: &ExtractionPipeline,
    config: &AcquireConfig,
    progress: &SharedProgress,
) -> Result<Summary> {
    let start = Instant::now();
    anyhow::ensure!(!candidates.is_empty(), "no candidate titles to process");

    let writer = DocumentWriter::new(&config.output_dir).context("output directory unusable")?;
    let filter = LanguageFilter::new(
        &config.language,
        config.min_language_confidence,
        config.min_title_similarity,
        config.min_content_chars,
    );
    let downloader = Downloader::new(adapters, pipeline, config.cache_degraded_failures);

    let queue = WorkQueue::new(candidates);
    let total = queue.total();
    log::info!(
        "Processing {} titles with {} workers ({} adapters)",
        total,
        config.workers,
        adapters.len()
    );

    let skipped = AtomicUsize::new(0);
    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let aborted = AtomicUsize::new(0);

    rayon::scope(|s| {
        for _ in 0..config.workers {
            s.spawn(|_| {
                while let Some(candidate) = queue.next() {
                    if is_shutdown_requested() {
                        break;
                    }

                    let key = TitleKey::new(&candidate.title, &candidate.language);
                    if let Lookup::Hit(entry) = cache.lookup(&key) {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        log::info!(
                            "skipping '{}' (cached {:?}: {})",
                            candidate.title,
                            entry.outcome,
                            entry.reason
                        );
                        continue;
                    }

                    let pb = progress.title_bar(&candidate.title);
                    let outcome = downloader.run(candidate, &filter, &pb);
                    pb.finish_and_clear();

                    match outcome {
                        TitleOutcome::Success(doc) => match writer.write(&doc) {
                            Ok(path) => {
                                succeeded.fetch_add(1, Ordering::Relaxed);
                                record(cache, &key, Outcome::Success, "");
                                log::info!(
                                    "'{}' acquired via {} → {}",
                                    candidate.title,
                                    doc.provenance.adapter,
                                    path.display()
                                );
                            }
                            Err(e) => {
                                // Not recorded: the document was obtained,
                                // only persisting it failed locally
                                failed.fetch_add(1, Ordering::Relaxed);
                                log::error!("cannot write '{}': {e:#}", candidate.title);
                            }
                        },
                        TitleOutcome::Failed { reason, cacheable } => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            if cacheable {
                                record(cache, &key, Outcome::Failed, &reason);
                            }
                            log::info!("'{}' skipped: {reason}", candidate.title);
                        }
                        TitleOutcome::Aborted => {
                            aborted.fetch_add(1, Ordering::Relaxed);
                            log::debug!("'{}' aborted, not recorded", candidate.title);
                        }
                    }
                }
            });
        }
    });

    let summary = Summary {
        total,
        skipped_cached: skipped.into_inner(),
        succeeded: succeeded.into_inner(),
        failed: failed.into_inner(),
        aborted: aborted.into_inner(),
        elapsed: start.elapsed(),
    };

    log::info!("=== Acquisition Summary ===");
    log::info!(
        "Titles: {} total, {} acquired, {} failed, {} cached skips, {} aborted",
        summary.total,
        summary.succeeded,
        summary.failed,
        summary.skipped_cached,
        summary.aborted
    );
    log::info!("Time: {:.1}s", summary.elapsed.as_secs_f64());

    Ok(summary)
}

/// A local-tier write failure means the store is unusable. That is the
/// one fatal condition down here, so stop dispatching new titles.
fn record(cache: &CacheCoordinator, key: &TitleKey, outcome: Outcome, reason: &str) {
    if let Err(e) = cache.record(key, outcome, reason) {
        log::error!("local cache store unusable ({e:#}), aborting run");
        request_shutdown();
    }
}
