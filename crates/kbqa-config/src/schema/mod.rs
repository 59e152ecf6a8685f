//! Configuration schema types for kbqa.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with defaults that talk to a local server.

mod polling;
mod server;
mod system;

pub use polling::*;
pub use server::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for kbqa.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct KbqaConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_correct_server() {
        let config = KbqaConfig::default();
        assert_eq!(config.server.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.server.api_prefix, "/api");
        assert_eq!(config.server.connect_timeout_secs, 10);
        assert_eq!(config.server.request_timeout_secs, 30);
    }

    #[test]
    fn default_config_polls_every_three_seconds() {
        let config = KbqaConfig::default();
        assert_eq!(config.polling.interval_secs, 3);
        assert_eq!(config.polling.interval(), std::time::Duration::from_secs(3));
    }

    #[test]
    fn default_config_has_correct_system_sections() {
        let config = KbqaConfig::default();
        assert_eq!(config.notifications.capacity, 16);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let toml_str = r#"
[polling]
interval_secs = 10
"#;
        let config: KbqaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.polling.interval_secs, 10);
        assert_eq!(config.server.base_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config: KbqaConfig = toml::from_str("").unwrap();
        assert_eq!(config.polling.interval_secs, 3);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn log_level_parses_lowercase() {
        let config: KbqaConfig = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
    }
}
