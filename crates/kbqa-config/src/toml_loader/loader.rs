//! Reading the config file, and creating it on first run.

use std::path::{Path, PathBuf};

use kbqa_common::ConfigError;
use tracing::{info, warn};

use super::template::default_config_toml;
use crate::schema::KbqaConfig;
use crate::validation;

const APP_DIR: &str = "kbqa";
const FILE_NAME: &str = "config.toml";

/// `<platform config dir>/kbqa/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

/// Write the commented template to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_failure =
        |what: &str, e: std::io::Error| ConfigError::ParseError(format!("{what} {}: {e}", path.display()));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_failure("cannot create directory for", e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_failure("cannot write", e))?;

    info!(path = %path.display(), "wrote default config");
    Ok(())
}

/// Parse the TOML file at `path`; absent keys take their defaults.
///
/// Validation problems are only logged here. `load_config` decides whether
/// they are fatal.
pub fn load_from_path(path: &Path) -> Result<KbqaConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    let config: KbqaConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), "config validation warning: {e}");
    }
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Load from [`default_config_path`], writing the template and returning
/// defaults when no file exists yet.
pub fn load_default() -> Result<KbqaConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(KbqaConfig::default())
        }
        other => other,
    }
}
