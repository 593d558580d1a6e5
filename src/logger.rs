//! Logging infrastructure
//!
//! This module provides a `log` backend that writes to a sink registered by
//! the board, usually the debug UART. Lines carry an ANSI-coloured level tag
//! and, with the `log-timestamps` feature, the generic timer count in
//! thousands of ticks since [`init`].

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU64, Ordering};
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Tick count recorded by [`init`]
static BOOT_TICKS: AtomicU64 = AtomicU64::new(0);

/// Where formatted records go
static SINK: Mutex<Option<&'static mut (dyn Write + Send)>> = Mutex::new(None);

/// Ticks since [`init`], in thousands
pub fn get_timestamp_k() -> u64 {
    let boot = BOOT_TICKS.load(Ordering::Relaxed);
    crate::arch::ticks().saturating_sub(boot) / 1000
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31mERROR\x1b[0m",
        Level::Warn => "\x1b[33mWARN\x1b[0m ",
        Level::Info => "\x1b[32mINFO\x1b[0m ",
        Level::Debug => "\x1b[34mDEBUG\x1b[0m",
        Level::Trace => "\x1b[35mTRACE\x1b[0m",
    }
}

/// Format one log line into `out`
pub fn write_record(
    out: &mut dyn Write,
    level: Level,
    args: fmt::Arguments<'_>,
    timestamp: Option<u64>,
) -> fmt::Result {
    match timestamp {
        Some(ts) => write!(out, "[{:>10}] [{}] {}\r\n", ts, level_tag(level), args),
        None => write!(out, "[{}] {}\r\n", level_tag(level), args),
    }
}

struct SinkLogger;

impl log::Log for SinkLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        #[cfg(feature = "log-timestamps")]
        let timestamp = Some(get_timestamp_k());
        #[cfg(not(feature = "log-timestamps"))]
        let timestamp = None;

        if let Some(sink) = SINK.lock().as_mut() {
            let _ = write_record(&mut **sink, record.level(), *record.args(), timestamp);
        }
    }

    fn flush(&self) {}
}

static LOGGER: SinkLogger = SinkLogger;

/// Install the logger writing to `sink`
///
/// Fails if a logger is already installed; the existing sink stays in place.
pub fn init(sink: &'static mut (dyn Write + Send)) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;

    BOOT_TICKS.store(crate::arch::ticks(), Ordering::Relaxed);
    *SINK.lock() = Some(sink);
    log::set_max_level(LevelFilter::Debug);
    Ok(())
}

/// Set the maximum log level
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
