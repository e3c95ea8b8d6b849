//! Configuration validation utilities.

use std::collections::HashSet;

use pewter_core::encoding;
use pewter_framework::is_valid_name;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, PewterConfig, PluginsConfig, ServerConfig};

/// Slowest accepted throttle rate, in lines per second.
const MIN_THROTTLE_RATE: f64 = 0.01;

/// Validates the entire configuration.
pub fn validate_config(config: &PewterConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_servers_config(&config.servers)?;
    validate_plugins_config(&config.plugins)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

/// Validates all server configurations.
fn validate_servers_config(servers: &[ServerConfig]) -> ConfigResult<()> {
    let mut seen_names = HashSet::new();

    for server in servers {
        if !seen_names.insert(server.name.to_lowercase()) {
            return Err(ConfigError::DuplicateServerName(server.name.clone()));
        }
        validate_server_config(server)?;
    }

    Ok(())
}

/// Validates a single server configuration.
fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    if server.name.is_empty() {
        return Err(ConfigError::missing_field("servers.name"));
    }

    if server.addresses.is_empty() {
        return Err(ConfigError::missing_field(format!(
            "servers.{}.addresses",
            server.name
        )));
    }
    for address in &server.addresses {
        validate_address(address)?;
    }

    validate_word(&server.nick, "nick")?;
    if server.nick.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return Err(ConfigError::validation(format!(
            "Nick '{}' must not start with a digit or '-'",
            server.nick
        )));
    }
    validate_word(&server.user, "user")?;

    for channel in &server.channels {
        if !channel.starts_with(['#', '&']) {
            return Err(ConfigError::validation(format!(
                "Channel '{channel}' must start with '#' or '&'"
            )));
        }
    }

    let rate = server.throttle_rate;
    if !rate.is_finite() || rate < 0.0 || (rate > 0.0 && rate < MIN_THROTTLE_RATE) {
        return Err(ConfigError::validation(format!(
            "Throttle rate must be 0 or at least {MIN_THROTTLE_RATE} lines per second"
        )));
    }
    if !server.throttle_burst.is_finite() || server.throttle_burst < 1.0 {
        return Err(ConfigError::validation("Throttle burst must be at least 1"));
    }

    if server.watchdog_secs > 0 && server.watchdog_check_secs == 0 {
        return Err(ConfigError::validation(
            "Watchdog check interval must be greater than 0",
        ));
    }

    for cap in &server.capabilities {
        validate_word(cap, "capability")?;
    }

    if encoding::lookup(&server.encoding).is_none() {
        return Err(ConfigError::validation(format!(
            "Unknown encoding: {}",
            server.encoding
        )));
    }

    Ok(())
}

/// Validates a `host:port` address.
fn validate_address(address: &str) -> ConfigResult<()> {
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(ConfigError::invalid_address(address, "expected host:port"));
    };
    if host.is_empty() {
        return Err(ConfigError::invalid_address(address, "empty host"));
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(ConfigError::invalid_address(
            address,
            "port must be 1-65535",
        )),
        Ok(_) => Ok(()),
    }
}

/// Non-empty, no whitespace.
fn validate_word(value: &str, what: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(ConfigError::missing_field(what));
    }
    if value.contains(char::is_whitespace) {
        return Err(ConfigError::validation(format!(
            "{what} '{value}' cannot contain spaces"
        )));
    }
    Ok(())
}

fn validate_plugins_config(plugins: &PluginsConfig) -> ConfigResult<()> {
    for name in plugins.autoload.iter().chain(plugins.settings.keys()) {
        if !is_valid_name(name) {
            return Err(ConfigError::InvalidPluginName(name.clone()));
        }
    }
    Ok(())
}
