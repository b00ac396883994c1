use crate::config::types::{
    CacheConfig, Concurrency, Config, CrawlerConfig, MaxAttempts, OutputConfig, RetryConfig,
    ShardConfig, UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.site.trim().is_empty() {
        return Err(ConfigError::Validation("site cannot be empty".to_string()));
    }
    if let Some(base_url) = &config.base_url {
        Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
    }
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_cache_config(&config.cache)?;
    validate_output_config(&config.output)?;
    validate_shard_config(&config.shards)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency == Concurrency::Fixed(0) {
        return Err(ConfigError::Validation(
            "concurrency must be at least 1".to_string(),
        ));
    }

    if config.max_subdivision_depth < 1 || config.max_subdivision_depth > 8 {
        return Err(ConfigError::Validation(format!(
            "max_subdivision_depth must be between 1 and 8, got {}",
            config.max_subdivision_depth
        )));
    }

    if !(0.0..=1.0).contains(&config.jitter_probability) {
        return Err(ConfigError::Validation(format!(
            "jitter_probability must be between 0 and 1, got {}",
            config.jitter_probability
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.delay_ms < 1 {
        return Err(ConfigError::Validation(
            "retry delay_ms must be >= 1".to_string(),
        ));
    }

    if config.max_attempts == MaxAttempts::Limit(0) {
        return Err(ConfigError::Validation(
            "max_attempts must be \"unbounded\" or >= 1".to_string(),
        ));
    }

    if config.budget_secs == Some(0) {
        return Err(ConfigError::Validation(
            "budget_secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.root.is_empty() {
        return Err(ConfigError::Validation(
            "cache root cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    let mut chars = config.delimiter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c != '"' && c != '\n' && c != '\r' => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "delimiter must be a single character other than a quote or newline, got '{}'",
            config.delimiter
        ))),
    }
}

/// Validates the shard partition
///
/// Keys must be prefix-free: a key that prefixes another would share
/// subdivision terms, and therefore cache entries, with it.
fn validate_shard_config(config: &ShardConfig) -> Result<(), ConfigError> {
    if config.keys.is_empty() {
        return Err(ConfigError::Validation(
            "at least one shard key is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for key in &config.keys {
        validate_shard_key(key)?;
        if !seen.insert(key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate shard key '{}'",
                key
            )));
        }
    }

    for key in &config.keys {
        if let Some(other) = config
            .keys
            .iter()
            .find(|other| *other != key && other.starts_with(key.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "shard key '{}' is a prefix of '{}'",
                key, other
            )));
        }
    }

    if config.extension_alphabet.is_empty() {
        return Err(ConfigError::Validation(
            "extension_alphabet cannot be empty".to_string(),
        ));
    }

    let mut letters = HashSet::new();
    for c in config.extension_alphabet.chars() {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit()) {
            return Err(ConfigError::Validation(format!(
                "extension_alphabet may only contain lowercase letters and digits, got '{}'",
                c
            )));
        }
        if !letters.insert(c) {
            return Err(ConfigError::Validation(format!(
                "extension_alphabet repeats '{}'",
                c
            )));
        }
    }

    Ok(())
}

fn validate_shard_key(key: &str) -> Result<(), ConfigError> {
    crate::table::ShardKey::new(key)
        .map(|_| ())
        .map_err(|e| ConfigError::Validation(e.to_string()))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
