//! Full configuration validation.
//!
//! Validates numeric ranges and the server URL scheme, collecting every
//! problem into a single `ConfigError`.

use crate::schema::KbqaConfig;
use kbqa_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &KbqaConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    let base_url = config.server.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(format!(
            "server.base_url = {base_url:?} must start with http:// or https://"
        ));
    }
    validate_range(
        &mut errors,
        "server.connect_timeout_secs",
        config.server.connect_timeout_secs,
        1,
        600,
    );
    validate_range(
        &mut errors,
        "server.request_timeout_secs",
        config.server.request_timeout_secs,
        1,
        600,
    );
    validate_range(
        &mut errors,
        "polling.interval_secs",
        config.polling.interval_secs,
        1,
        3600,
    );
    validate_range(
        &mut errors,
        "notifications.capacity",
        config.notifications.capacity,
        1,
        256,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

/// Push an error if `value` is outside `[min, max]`.
fn validate_range(errors: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}
