//! System configuration types: notifications and logging.

use serde::{Deserialize, Serialize};

/// User-visible notice queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Maximum queued notices (valid range: 1-256).
    pub capacity: u32,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `tracing` filter directive for the kbqa crates at this level.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Trace => "kbqa=trace",
            Self::Debug => "kbqa=debug",
            Self::Info => "kbqa=info",
            Self::Warn => "kbqa=warn",
            Self::Error => "kbqa=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
