use crate::config::{Config, ServerConfig};
use crate::error::{Error, Result};
use std::collections::HashSet;

/// Validates a server configuration
pub fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        return Err(Error::ConfigInvalid("Server has empty name".to_string()));
    }

    if config.directory.as_os_str().is_empty() {
        return Err(Error::ConfigInvalid(format!(
            "Server '{}' has empty directory",
            config.name
        )));
    }

    // Whether the directory exists is checked when the registry loads, so that
    // one broken server does not prevent the others from being managed.

    Ok(())
}

/// Validates the list of server configurations
pub fn validate_server_configs(configs: &[ServerConfig]) -> Result<()> {
    if configs.is_empty() {
        return Err(Error::ConfigInvalid("No servers configured".to_string()));
    }

    let mut seen = HashSet::new();
    for config in configs {
        validate_server_config(config)?;

        // Lookups ignore case, so names differing only by case would be ambiguous
        if !seen.insert(config.name.to_lowercase()) {
            return Err(Error::ConfigInvalid(format!(
                "Server name '{}' is used more than once",
                config.name
            )));
        }
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server_configs(&config.servers)?;

    if config.max_running_public == 0 {
        return Err(Error::ConfigInvalid(
            "maxRunningPublic must be at least 1".to_string(),
        ));
    }

    let supervisor = &config.supervisor;
    if supervisor.entry_point.trim().is_empty() {
        return Err(Error::ConfigInvalid("entryPoint is empty".to_string()));
    }
    if supervisor.shutdown_command.trim().is_empty() {
        return Err(Error::ConfigInvalid("shutdownCommand is empty".to_string()));
    }
    if supervisor.ready_marker.is_empty() {
        return Err(Error::ConfigInvalid("readyMarker is empty".to_string()));
    }
    if supervisor.startup_timeout_secs == Some(0) || supervisor.stop_timeout_secs == Some(0) {
        return Err(Error::ConfigInvalid(
            "Timeouts must be greater than zero".to_string(),
        ));
    }

    if config.status.probe_timeout_ms == 0 {
        return Err(Error::ConfigInvalid(
            "probeTimeoutMs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}
