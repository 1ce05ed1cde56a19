//! Logging setup: env_logger backend, routed through indicatif in TTY mode

use std::io::Write;

use indicatif::MultiProgress;

fn level_label(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

fn level_color(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    }
}

/// Logger that prints through indicatif MultiProgress so lines never tear bars.
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
        let level = record.level();
        let line = format!(
            "[{}{}\x1b[0m] {}",
            level_color(level),
            level_label(level),
            record.args()
        );
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Default filter: debug wins over quiet
fn default_level(quiet: bool, debug: bool) -> &'static str {
    match (debug, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    }
}

/// Initialize logging; pass the progress `MultiProgress` when attached to a TTY.
///
/// `RUST_LOG` overrides the default level.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    let env = env_logger::Env::default().default_filter_or(default_level(quiet, debug));

    match multi {
        Some(multi) => {
            let logger = env_logger::Builder::from_env(env).build();
            let max_level = logger.filter();
            if log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone())))
                .is_ok()
            {
                log::set_max_level(max_level);
            }
        }
        None => {
            // Plain lines with target for log aggregation; stdout stays clean for index lines
            let _ = env_logger::Builder::from_env(env)
                .target(env_logger::Target::Stderr)
                .format(|buf, record| {
                    writeln!(
                        buf,
                        "[{}] {}: {}",
                        level_label(record.level()),
                        record.target(),
                        record.args()
                    )
                })
                .try_init();
        }
    }
}
