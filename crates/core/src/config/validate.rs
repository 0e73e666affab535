use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Broadcast destination is set
/// - Rate limit window and cap are at least 1
/// - Progress step is within (0, 100]
/// - Queue poll interval is positive and a target container is named
/// - The admin API key, when set, is not blank
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.broadcast.destination.trim().is_empty() {
        return Err(invalid("broadcast.destination cannot be empty"));
    }

    if config.rate_limit.shared_max_sends == 0 {
        return Err(invalid("rate_limit.shared_max_sends must be at least 1"));
    }
    if config.rate_limit.shared_window_secs == 0 {
        return Err(invalid("rate_limit.shared_window_secs must be at least 1"));
    }

    let step = config.progress.percent_step;
    if !(step > 0.0 && step <= 100.0) {
        return Err(invalid("progress.percent_step must be in (0, 100]"));
    }

    if config.queue.poll_interval_ms == 0 {
        return Err(invalid("queue.poll_interval_ms cannot be 0"));
    }
    if config.queue.target_container.trim().is_empty() {
        return Err(invalid("queue.target_container cannot be empty"));
    }

    if config
        .access
        .admin_api_key
        .as_deref()
        .is_some_and(|key| key.trim().is_empty())
    {
        return Err(invalid("access.admin_api_key cannot be blank"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
