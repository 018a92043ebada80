//! Minimal stderr logger.
//!
//! Lines look like `[  12.345s  INFO markerdrive::controller] message`.
//! Install once at startup with [`init_with_level`] or [`init_from_env`];
//! the `tracing` feature adds [`init_tracing`] for span timing.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable read by [`init_from_env`].
pub const LOG_ENV: &str = "MARKERDRIVE_LOG";

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{:8.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Parse a level name (`off`, `error`, ..., `trace`), falling back to `default`.
pub fn parse_level(raw: Option<&str>, default: LevelFilter) -> LevelFilter {
    raw.and_then(|s| LevelFilter::from_str(s.trim()).ok())
        .unwrap_or(default)
}

/// Install the stderr logger at the level named by `MARKERDRIVE_LOG` (default `info`).
pub fn init_from_env() -> Result<(), log::SetLoggerError> {
    let raw = std::env::var(LOG_ENV).ok();
    init_with_level(parse_level(raw.as_deref(), LevelFilter::Info))
}

#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_accepts_names_and_falls_back() {
        assert_eq!(parse_level(Some("debug"), LevelFilter::Info), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" WARN "), LevelFilter::Info), LevelFilter::Warn);
        assert_eq!(parse_level(Some("loud"), LevelFilter::Info), LevelFilter::Info);
        assert_eq!(parse_level(None, LevelFilter::Error), LevelFilter::Error);
    }
}
