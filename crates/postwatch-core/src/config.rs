use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Longest request timeout accepted. Polls must never block for long.
const MAX_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Pin comparison spans one cycle, so identities must outlive two.
const MIN_SEEN_RETAIN_CYCLES: u64 = 2;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let env = parse_environment(&or_default("POSTWATCH_ENV", "development"))?;
    let log_level = or_default("POSTWATCH_LOG_LEVEL", "info");
    let weibo_base_url = or_default("POSTWATCH_WEIBO_BASE_URL", "https://m.weibo.cn");
    let user_agent = or_default("POSTWATCH_USER_AGENT", "postwatch/0.1 (feed-monitor)");

    let request_timeout_secs = parse_u64("POSTWATCH_REQUEST_TIMEOUT_SECS", "4")?;
    let max_retries = parse_u32("POSTWATCH_MAX_RETRIES", "1")?;
    let retry_backoff_base_ms = parse_u64("POSTWATCH_RETRY_BACKOFF_BASE_MS", "500")?;
    let seen_retain_cycles = parse_u64("POSTWATCH_SEEN_RETAIN_CYCLES", "16")?;
    let poll_interval_secs = parse_u64("POSTWATCH_POLL_INTERVAL_SECS", "30")?;

    let max_post_age_secs = match lookup("POSTWATCH_MAX_POST_AGE_SECS") {
        Ok(raw) if !raw.trim().is_empty() => {
            Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidEnvVar {
                        var: "POSTWATCH_MAX_POST_AGE_SECS".to_string(),
                        reason: e.to_string(),
                    })?,
            )
        }
        _ => None,
    };

    let config = AppConfig {
        env,
        log_level,
        weibo_base_url,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        seen_retain_cycles,
        max_post_age_secs,
        poll_interval_secs,
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs == 0 || config.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "POSTWATCH_REQUEST_TIMEOUT_SECS must be between 1 and {MAX_REQUEST_TIMEOUT_SECS}, got {}",
            config.request_timeout_secs
        )));
    }
    if config.seen_retain_cycles < MIN_SEEN_RETAIN_CYCLES {
        return Err(ConfigError::Validation(format!(
            "POSTWATCH_SEEN_RETAIN_CYCLES must be at least {MIN_SEEN_RETAIN_CYCLES}, got {}",
            config.seen_retain_cycles
        )));
    }
    if config.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "POSTWATCH_POLL_INTERVAL_SECS must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "POSTWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
