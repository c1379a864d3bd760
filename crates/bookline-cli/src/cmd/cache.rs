//! Cache subcommand - inspect and maintain the failure cache

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use bookline_cache::{CacheCoordinator, LocalStore, TitleKey};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show entry counts and remote-tier status
    Stats,
    /// Drop all failed entries so they are retried (success entries stay)
    Clear,
    /// Forget one title so the next run retries it
    Remove {
        /// Title text (normalization is applied automatically)
        title: String,
        /// Language the title was attempted in
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Export the failed-title list to a text file
    Export {
        /// Destination path
        path: PathBuf,
    },
}

pub fn run(args: CacheArgs, config: &Config) -> Result<()> {
    let local = LocalStore::open(&config.cache.dir)?;
    // Maintenance commands propagate deletes to the remote tier when it
    // is configured; a missing remote just means local-only maintenance.
    let remote = super::acquire::build_remote(&config.cache);
    let cache = CacheCoordinator::new(local, remote, config.cache.ttl_days);

    match args.action {
        CacheAction::Stats => {
            let stats = cache.stats();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Cache").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);
            table.add_row(vec!["Entries", &stats.total.to_string()]);
            table.add_row(vec!["Failed", &stats.failed.to_string()]);
            table.add_row(vec!["Success", &stats.success.to_string()]);
            table.add_row(vec![
                "Remote tier",
                if stats.remote_enabled { "connected" } else { "local only" },
            ]);
            eprintln!("\n{table}");
        }
        CacheAction::Clear => {
            let cleared = cache.clear_failed()?;
            eprintln!("Cleared {cleared} failed entries");
        }
        CacheAction::Remove { title, language } => {
            let language = language.unwrap_or_else(|| config.acquire.language.clone());
            let key = TitleKey::new(&title, &language);
            if cache.remove(&key)? {
                eprintln!("Removed '{title}' [{language}]");
            } else {
                eprintln!("No entry for '{title}' [{language}]");
            }
        }
        CacheAction::Export { path } => {
            let count = cache.export_failed(&path)?;
            eprintln!("Exported {count} failed titles to {}", path.display());
        }
    }

    if let Some(synced) = cache.finish() {
        log::debug!("remote cache: {synced} writes synced");
    }
    Ok(())
}
