//! Logging setup with indicatif integration
//!
//! In TTY mode log lines are printed through the `MultiProgress` so they
//! land above the per-title spinners instead of tearing them.

use indicatif::MultiProgress;

/// Padded level label, optionally wrapped in an ANSI color.
fn level_label(level: log::Level, color: bool) -> String {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return label.to_string();
    }
    let ansi = match level {
        log::Level::Error => "31",
        log::Level::Warn => "33",
        log::Level::Info => "32",
        log::Level::Debug => "36",
        log::Level::Trace => "35",
    };
    format!("\x1b[{ansi}m{label}\x1b[0m")
}

/// Logger that suspends the progress display around each line.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        // Only used in TTY mode, so color is always on
        let line = format!("[{}] {}", level_label(record.level(), true), record.args());
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initialize logging. `multi: Some(..)` enables the TTY bridge.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let default_level = match (debug, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    };
    let env = env_logger::Env::default().default_filter_or(default_level);

    match multi {
        Some(multi) => {
            let logger = env_logger::Builder::from_env(env).build();
            let max_level = logger.filter();
            log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone())))
                .expect("failed to init logger");
            log::set_max_level(max_level);
        }
        None => {
            // Non-TTY: plain labels, no ANSI, for log aggregation
            env_logger::Builder::from_env(env)
                .format(|buf, record| {
                    writeln!(
                        buf,
                        "[{}] {}",
                        level_label(record.level(), false),
                        record.args()
                    )
                })
                .init();
        }
    }
}
