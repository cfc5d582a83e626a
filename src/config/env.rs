use crate::config::Config;
use crate::error::ConfigError;
use log::debug;
use std::str::FromStr;

pub const MAX_ERRORS: &str = "LOGWARDEN_MAX_ERRORS";
pub const ERROR_WINDOW_MINUTES: &str = "LOGWARDEN_ERROR_WINDOW_MINUTES";
pub const MAX_AVG_RESPONSE_TIME_MS: &str = "LOGWARDEN_MAX_AVG_RESPONSE_TIME_MS";
pub const MAX_P95_RESPONSE_TIME_MS: &str = "LOGWARDEN_MAX_P95_RESPONSE_TIME_MS";
pub const MAX_MEMORY_PERCENT: &str = "LOGWARDEN_MAX_MEMORY_PERCENT";
pub const MAX_DISK_PERCENT: &str = "LOGWARDEN_MAX_DISK_PERCENT";
pub const COOLDOWN_MINUTES: &str = "LOGWARDEN_COOLDOWN_MINUTES";
pub const WEBHOOK_URL: &str = "LOGWARDEN_WEBHOOK_URL";

/// Overlay environment variables onto `config`
///
/// `lookup` returns the value of a variable, or `None` when it is unset.
/// Empty values are treated as unset.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` naming the variable whose value
/// cannot be parsed.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let t = &mut config.thresholds;
    override_parsed(&get, MAX_ERRORS, &mut t.max_errors)?;
    override_parsed(&get, ERROR_WINDOW_MINUTES, &mut t.error_window_minutes)?;
    override_parsed(&get, MAX_AVG_RESPONSE_TIME_MS, &mut t.max_avg_response_time_ms)?;
    override_parsed(&get, MAX_P95_RESPONSE_TIME_MS, &mut t.max_p95_response_time_ms)?;
    override_parsed(&get, MAX_MEMORY_PERCENT, &mut t.max_memory_percent)?;
    override_parsed(&get, MAX_DISK_PERCENT, &mut t.max_disk_percent)?;
    override_parsed(&get, COOLDOWN_MINUTES, &mut config.alerts.cooldown_minutes)?;

    if let Some(url) = get(WEBHOOK_URL) {
        debug!("Overriding webhook URL from {}", WEBHOOK_URL);
        config.alerts.webhook_url = Some(url.trim().to_string());
    }

    Ok(())
}

fn override_parsed<T, G>(get: &G, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *target = raw.trim().parse::<T>().map_err(|e| {
            ConfigError::ValidationError(format!("{}='{}': {}", key, raw, e))
        })?;
        debug!("Overriding {} from environment", key);
    }
    Ok(())
}
