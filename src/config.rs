use std::env;

use crate::common::types::{MatchFlags, IMAGE_NAME_CAPACITY, QUERY_BUFFER_CAPACITY};
use crate::logging::LogLevel;

/// Environment variable selecting the diagnostic log level.
pub const LOG_ENV_VAR: &str = "FILEUSER_LOG";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileUserConfig {
    /// Bytes in the query buffer. Fixed for the life of a run.
    pub buffer_capacity: usize,
    /// Characters available for each process image path.
    pub name_capacity: usize,
    pub match_flags: MatchFlags,
    pub log_level: LogLevel,
}

impl Default for FileUserConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: QUERY_BUFFER_CAPACITY,
            name_capacity: IMAGE_NAME_CAPACITY,
            match_flags: MatchFlags::default(),
            log_level: LogLevel::Off,
        }
    }
}

impl FileUserConfig {
    /// Defaults plus whatever the environment overrides. An unreadable
    /// level is reported and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var(LOG_ENV_VAR) {
            config.log_level = parse_log_level(&value);
        }
        config
    }

    pub fn with_match_flags(mut self, match_flags: MatchFlags) -> Self {
        self.match_flags = match_flags;
        self
    }
}

fn parse_log_level(value: &str) -> LogLevel {
    match value.parse() {
        Ok(level) => level,
        Err(err) => {
            eprintln!("fileuser: ignoring {LOG_ENV_VAR}: {err}");
            LogLevel::Off
        }
    }
}
