use log::{Level, LevelFilter, Log, Metadata, Record};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use crate::common::errors::{FileUserError, Result};

#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LogLevel {
    #[default]
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "off" | "0" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

const MODE_DISABLED: u8 = 0;
const MODE_STDERR: u8 = 1;

pub struct FileUserLogger {
    mode: AtomicU8,
    level: AtomicU8,
}

impl FileUserLogger {
    const fn new() -> Self {
        Self {
            mode: AtomicU8::new(MODE_DISABLED),
            level: AtomicU8::new(LogLevel::Off as u8),
        }
    }

    fn level(&self) -> Option<Level> {
        level_from_u8(self.level.load(Ordering::Relaxed))
    }

    fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
        log::set_max_level(level_filter_from_u8(level as u8));
    }

    fn set_mode(&self, mode: u8) {
        self.mode.store(mode, Ordering::Relaxed);
    }
}

impl Log for FileUserLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let Some(level) = self.level() else {
            return false;
        };
        metadata.level() <= level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if self.mode.load(Ordering::Relaxed) == MODE_STDERR {
            eprintln!("[fileuser][{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: FileUserLogger = FileUserLogger::new();
static LOGGER_STATE: OnceLock<LoggerInstall> = OnceLock::new();

#[derive(Copy, Clone)]
enum LoggerInstall {
    Installed,
    External,
}

fn init_logger() -> LoggerInstall {
    *LOGGER_STATE.get_or_init(|| match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(LevelFilter::Off);
            LoggerInstall::Installed
        }
        Err(_) => LoggerInstall::External,
    })
}

fn level_filter_from_u8(level: u8) -> LevelFilter {
    match level {
        x if x == LogLevel::Error as u8 => LevelFilter::Error,
        x if x == LogLevel::Warn as u8 => LevelFilter::Warn,
        x if x == LogLevel::Info as u8 => LevelFilter::Info,
        x if x == LogLevel::Debug as u8 => LevelFilter::Debug,
        x if x == LogLevel::Trace as u8 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

fn level_from_u8(level: u8) -> Option<Level> {
    match level {
        x if x == LogLevel::Error as u8 => Some(Level::Error),
        x if x == LogLevel::Warn as u8 => Some(Level::Warn),
        x if x == LogLevel::Info as u8 => Some(Level::Info),
        x if x == LogLevel::Debug as u8 => Some(Level::Debug),
        x if x == LogLevel::Trace as u8 => Some(Level::Trace),
        _ => None,
    }
}

pub fn log_set_stderr(level: LogLevel) -> Result<()> {
    if matches!(init_logger(), LoggerInstall::External) {
        return Err(FileUserError::LoggerUnavailable);
    }
    LOGGER.set_mode(MODE_STDERR);
    LOGGER.set_level(level);
    Ok(())
}
