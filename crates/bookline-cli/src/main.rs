//! bookline - book acquisition pipeline for the typing trainer
//!
//! Fetches children's books in a target language from public archives,
//! extracts and validates their text, and maintains the dual-tier
//! failure cache shared between instances.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use bookline_core::shutdown_flag;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "bookline")]
#[command(about = "Book acquisition pipeline for the typing trainer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./bookline.toml or ~/.config/bookline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Whole-request timeout in seconds for a single fetch attempt
    #[arg(long, global = true)]
    request_timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Acquire books for a language and emit practice documents
    Acquire(cmd::acquire::AcquireArgs),
    /// Inspect and maintain the failure cache
    Cache(cmd::cache::CacheArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(bookline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — progress bars show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    bookline_core::init_logging(quiet, cli.debug, multi);

    // Load configuration
    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    // Apply HTTP settings (config file defaults, CLI overrides)
    bookline_core::set_http_config(bookline_core::HttpConfig {
        request_timeout: std::time::Duration::from_secs(
            cli.request_timeout.unwrap_or(config.http.request_timeout),
        ),
        max_retries: cli.max_retries.unwrap_or(config.http.max_retries),
    });

    match cli.command {
        Command::Acquire(args) => {
            setup_signal_handler();
            cmd::acquire::run(args, &config, &progress)
        }
        Command::Cache(args) => cmd::cache::run(args, &config),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["Language", &config.acquire.language]);
            table.add_row(vec![
                "Output directory",
                &config.acquire.output_dir.display().to_string(),
            ]);
            table.add_row(vec!["Workers", &config.acquire.workers.to_string()]);
            table.add_row(vec![
                "Cache dir",
                &config.cache.dir.display().to_string(),
            ]);
            table.add_row(vec!["Failed TTL", &format!("{} days", config.cache.ttl_days)]);
            table.add_row(vec![
                "Remote cache",
                config.cache.endpoint.as_deref().unwrap_or("not configured"),
            ]);
            table.add_row(vec![
                "Remote credentials",
                if config.cache.access_key.is_some() && config.cache.secret_key.is_some() {
                    "configured"
                } else {
                    "not set"
                },
            ]);
            table.add_row(vec![
                "Title endpoint",
                config.titles.endpoint.as_deref().unwrap_or("not configured"),
            ]);
            table.add_row(vec![
                "Request timeout",
                &format!("{}s", config.http.request_timeout),
            ]);
            table.add_row(vec!["Max retries", &config.http.max_retries.to_string()]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}

fn setup_signal_handler() {
    // First signal: set graceful shutdown flag
    // Second signal: force exit (default SIGINT behavior restored)
    // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGTERM, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGTERM handler");
        signal_hook::low_level::register(signal_hook::consts::SIGINT, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGINT handler");
    }
}
