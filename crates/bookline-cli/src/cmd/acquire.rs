//! Acquire subcommand - fetch books and emit practice documents

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use bookline_acquire::{
    AcquireConfig, CandidateTitle, FileTitleSource, HttpTitleSource, TitleOrigin, TitleSource,
    run_acquisition,
};
use bookline_cache::{CacheCoordinator, LocalStore, RemoteConfig, RemoteTier, S3RemoteStore};
use bookline_core::SharedProgress;
use bookline_extract::{ExtractionPipeline, OcrEngine, Tesseract, poppler_available};

use crate::config::{CacheSection, Config};

#[derive(Args, Debug)]
pub struct AcquireArgs {
    /// Target language for practice material
    #[arg(short, long)]
    pub language: Option<String>,

    /// Number of candidate titles to request from the suggestion service
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Acquire a specific title (repeatable, skips the suggestion service)
    #[arg(short, long = "title")]
    pub titles: Vec<String>,

    /// File with one candidate title per line (skips the suggestion service)
    #[arg(long)]
    pub titles_file: Option<PathBuf>,

    /// Output directory for finished documents
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,
}

pub fn run(args: AcquireArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let language = args
        .language
        .unwrap_or_else(|| config.acquire.language.clone());
    let count = args.count.unwrap_or(config.acquire.count);
    let output_dir = args
        .output
        .unwrap_or_else(|| config.acquire.output_dir.clone());

    let candidates = collect_candidates(&args.titles, &args.titles_file, config, &language, count)?;
    anyhow::ensure!(
        !candidates.is_empty(),
        "no candidate titles: title source unreachable or empty"
    );

    // Cache: local tier is mandatory, remote tier is best-effort
    let local = LocalStore::open(&config.cache.dir)?;
    let remote = build_remote(&config.cache);
    let cache = CacheCoordinator::new(local, remote, config.cache.ttl_days);

    // Capability probes: absence degrades, never aborts
    let ocr: Option<Box<dyn OcrEngine>> = match Tesseract::probe(&language) {
        Some(engine) => Some(Box::new(engine)),
        None => {
            log::warn!("tesseract not found: scanned books will be skipped this run");
            None
        }
    };
    if !poppler_available() {
        log::warn!("poppler tools not found: PDF extraction will fail this run");
    }

    let pipeline = ExtractionPipeline::new(config.extract.thresholds(), ocr)
        .with_page_limits(config.extract.max_pages, config.extract.ocr_max_pages);

    let acquire_config = AcquireConfig {
        language: language.clone(),
        count,
        workers: args.workers.unwrap_or(config.acquire.workers),
        output_dir,
        cache_degraded_failures: config.extract.cache_degraded_failures,
        thresholds: config.extract.thresholds(),
        min_language_confidence: config.acquire.min_language_confidence,
        min_title_similarity: config.acquire.min_title_similarity,
        min_content_chars: config.acquire.min_content_chars,
    };

    log::info!("Acquiring up to {} titles in {language}", candidates.len());
    let adapters = bookline_sources::default_adapters();
    let summary = run_acquisition(
        candidates,
        &cache,
        &adapters,
        &pipeline,
        &acquire_config,
        progress,
    )?;

    let stats = cache.stats();
    if let Some(synced) = cache.finish() {
        log::info!("remote cache: {synced} writes synced");
    }
    if stats.remote_sync_errors || stats.remote_sync_dropped > 0 {
        log::warn!(
            "remote cache sync incomplete ({} dropped); local records stand alone until the next run",
            stats.remote_sync_dropped
        );
    }

    print_summary(&[
        ("Titles", summary.total.to_string()),
        ("Acquired", summary.succeeded.to_string()),
        ("Failed", summary.failed.to_string()),
        ("Cached skips", summary.skipped_cached.to_string()),
        ("Aborted", summary.aborted.to_string()),
        ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ]);

    Ok(())
}

fn collect_candidates(
    titles: &[String],
    titles_file: &Option<PathBuf>,
    config: &Config,
    language: &str,
    count: usize,
) -> Result<Vec<CandidateTitle>> {
    if !titles.is_empty() {
        return Ok(titles
            .iter()
            .map(|t| CandidateTitle::new(t.clone(), language, TitleOrigin::UserProvided))
            .collect());
    }

    if let Some(path) = titles_file {
        let suggested = FileTitleSource::new(path).suggest(language, count)?;
        return Ok(suggested
            .into_iter()
            .map(|t| CandidateTitle::new(t, language, TitleOrigin::UserProvided))
            .collect());
    }

    let Some(endpoint) = &config.titles.endpoint else {
        anyhow::bail!(
            "no title source: pass --title/--titles-file or configure [titles] endpoint"
        );
    };

    // A failed batch is not fatal; the caller aborts only on zero candidates
    match HttpTitleSource::new(endpoint).suggest(language, count) {
        Ok(suggested) => Ok(suggested
            .into_iter()
            .map(|t| CandidateTitle::new(t, language, TitleOrigin::Suggested))
            .collect()),
        Err(e) => {
            log::error!("title batch failed: {e:#}");
            Ok(Vec::new())
        }
    }
}

/// Build the remote tier when it is fully configured and reachable;
/// anything less downgrades to local-only caching with one warning.
pub(crate) fn build_remote(cache: &CacheSection) -> Option<Arc<dyn RemoteTier>> {
    let endpoint = cache.endpoint.as_ref()?;
    let (Some(access_key), Some(secret_key)) = (&cache.access_key, &cache.secret_key) else {
        log::warn!("remote cache endpoint set but credentials missing, using local tier only");
        return None;
    };

    let store = match S3RemoteStore::new(RemoteConfig {
        endpoint: endpoint.clone(),
        region: cache.region.clone(),
        bucket: cache.bucket.clone(),
        access_key: access_key.clone(),
        secret_key: secret_key.clone(),
    }) {
        Ok(store) => store,
        Err(e) => {
            log::warn!("remote cache misconfigured ({e}), using local tier only");
            return None;
        }
    };

    match store.probe() {
        Ok(()) => {
            log::info!("connected to remote cache bucket '{}'", cache.bucket);
            Some(Arc::new(store))
        }
        Err(e) => {
            log::warn!("remote cache unreachable ({e}), using local tier only");
            None
        }
    }
}

/// Print a key-value summary table on stderr
fn print_summary(rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Acquisition").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}
