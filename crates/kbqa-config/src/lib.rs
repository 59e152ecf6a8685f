//! kbqa configuration system.
//!
//! Provides TOML-based configuration with validation. All config sections
//! use sensible defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kbqa_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{KbqaConfig, LogLevel, CONFIG_SCHEMA_VERSION};

use std::path::Path;

use kbqa_common::ConfigError;

/// Environment variable that overrides `server.base_url`.
pub const SERVER_URL_ENV: &str = "KBQA_SERVER_URL";

/// Load config from `path`, or from the platform default path when `None`.
///
/// The default path gets a commented template written on first use. The
/// `KBQA_SERVER_URL` environment variable is applied last, then the result
/// is validated.
pub fn load_config(path: Option<&Path>) -> Result<KbqaConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };

    if let Ok(url) = std::env::var(SERVER_URL_ENV) {
        apply_server_url(&mut config, &url);
    }

    validation::validate(&config)?;
    Ok(config)
}

fn apply_server_url(config: &mut KbqaConfig, url: &str) {
    let url = url.trim();
    if !url.is_empty() {
        tracing::info!("server url overridden by {SERVER_URL_ENV}: {url}");
        config.server.base_url = url.to_string();
    }
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &KbqaConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
