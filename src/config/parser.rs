use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default cap on concurrently active public servers.
pub const DEFAULT_MAX_RUNNING_PUBLIC: usize = 2;
/// Default entry point script, relative to each server directory.
pub const DEFAULT_ENTRY_POINT: &str = "run.sh";
/// Default line written to a server's stdin to request a graceful shutdown.
pub const DEFAULT_SHUTDOWN_COMMAND: &str = "stop";
/// Default substring of the line a Minecraft server prints once it accepts commands,
/// e.g. `Done (4.213s)! For help, type "help"`.
pub const DEFAULT_READY_MARKER: &str = ")! For help, type";
/// Default host queried by the status probe.
pub const DEFAULT_STATUS_HOST: &str = "127.0.0.1";
/// Default status probe deadline in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;

/// Configuration for a single managed server instance.
///
/// # Examples
///
/// ```
/// use mc_runner::config::ServerConfig;
///
/// let server_config = ServerConfig {
///     name: "Survival".to_string(),
///     directory: "servers/survival".into(),
///     public: true,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unique name, matched case-insensitively by lookups.
    pub name: String,

    /// Server root directory; the entry point runs with this as its working directory.
    #[serde(alias = "folder")]
    pub directory: PathBuf,

    /// Whether non-administrators may start this server.
    #[serde(default, alias = "isPublic")]
    pub public: bool,
}

/// Auto-restart policy applied when a running server exits on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartPolicy {
    /// Maximum automatic restarts since the last explicit start.
    /// `None` restarts after every crash.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Settings shared by every process supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorConfig {
    /// Script spawned inside each server directory.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Line written to stdin on stop.
    #[serde(default = "default_shutdown_command")]
    pub shutdown_command: String,

    /// Substring that marks a stdout line as "server ready".
    #[serde(default = "default_ready_marker")]
    pub ready_marker: String,

    #[serde(default)]
    pub restart: RestartPolicy,

    /// Kill a server that has not become ready within this many seconds.
    #[serde(default)]
    pub startup_timeout_secs: Option<u64>,

    /// Kill a server that has not exited this many seconds after a stop request.
    #[serde(default)]
    pub stop_timeout_secs: Option<u64>,
}

impl SupervisorConfig {
    pub fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout_secs.map(Duration::from_secs)
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            entry_point: default_entry_point(),
            shutdown_command: default_shutdown_command(),
            ready_marker: default_ready_marker(),
            restart: RestartPolicy::default(),
            startup_timeout_secs: None,
            stop_timeout_secs: None,
        }
    }
}

/// Status probe and display settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusConfig {
    /// Host the status probe connects to.
    #[serde(default = "default_status_host")]
    pub status_host: String,

    /// Probe deadline in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Host shown to users as `host:port`.
    #[serde(default)]
    pub public_host: Option<String>,

    /// Display address overrides keyed by port.
    #[serde(default)]
    pub addresses: BTreeMap<String, String>,
}

impl StatusConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            status_host: default_status_host(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            public_host: None,
            addresses: BTreeMap::new(),
        }
    }
}

/// Main configuration for the MC Runner.
///
/// # Schema
///
/// ```json
/// {
///   "serversRoot": "servers",
///   "administrators": ["184467440737095516"],
///   "maxRunningPublic": 2,
///   "servers": [
///     { "name": "Survival", "directory": "survival", "public": true },
///     { "name": "Creative", "folder": "creative", "isPublic": false }
///   ],
///   "publicHost": "play.example.org",
///   "addresses": { "25566": "creative.example.org" },
///   "restart": { "maxAttempts": 3 }
/// }
/// ```
///
/// # Examples
///
/// ```
/// use mc_runner::config::Config;
///
/// let config = Config::parse_from_str(r#"{
///     "servers": [{ "name": "Survival", "directory": "/srv/mc/survival", "public": true }]
/// }"#).unwrap();
/// assert_eq!(config.max_running_public, 2);
/// assert_eq!(config.supervisor.entry_point, "run.sh");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Managed servers, in display order.
    pub servers: Vec<ServerConfig>,

    /// Base for relative server directories.
    #[serde(default)]
    pub servers_root: Option<PathBuf>,

    /// User ids allowed to start restricted servers.
    #[serde(default)]
    pub administrators: Vec<String>,

    /// Maximum number of public servers active at the same time.
    #[serde(default = "default_max_running_public")]
    pub max_running_public: usize,

    #[serde(flatten)]
    pub supervisor: SupervisorConfig,

    #[serde(flatten)]
    pub status: StatusConfig,
}

impl Config {
    /// Creates a configuration with default settings for the given servers.
    pub fn with_servers(servers: Vec<ServerConfig>) -> Self {
        Self {
            servers,
            servers_root: None,
            administrators: Vec::new(),
            max_running_public: DEFAULT_MAX_RUNNING_PUBLIC,
            supervisor: SupervisorConfig::default(),
            status: StatusConfig::default(),
        }
    }

    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, anything else as
    /// JSON. A relative `serversRoot` is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the file cannot be read or does not
    /// match the schema.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let mut config = if is_yaml {
            Self::parse_from_yaml_str(&content)?
        } else {
            Self::parse_from_str(&content)?
        };

        if let (Some(root), Some(base)) = (config.servers_root.as_ref(), path.parent()) {
            if root.is_relative() {
                config.servers_root = Some(base.join(root));
            }
        }

        Ok(config)
    }

    /// Parses a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parses a configuration from a YAML string.
    pub fn parse_from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))
    }

    /// Resolves a server's directory against `serversRoot`.
    pub fn server_directory(&self, server: &ServerConfig) -> PathBuf {
        match &self.servers_root {
            Some(root) if server.directory.is_relative() => root.join(&server.directory),
            _ => server.directory.clone(),
        }
    }

    /// Whether `user_id` is listed as an administrator.
    pub fn is_administrator(&self, user_id: &str) -> bool {
        self.administrators.iter().any(|admin| admin == user_id)
    }
}

fn default_max_running_public() -> usize {
    DEFAULT_MAX_RUNNING_PUBLIC
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

fn default_shutdown_command() -> String {
    DEFAULT_SHUTDOWN_COMMAND.to_string()
}

fn default_ready_marker() -> String {
    DEFAULT_READY_MARKER.to_string()
}

fn default_status_host() -> String {
    DEFAULT_STATUS_HOST.to_string()
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bot_config() {
        let config_str = r#"{
            "administrators": ["42"],
            "servers": [
                { "name": "Vanilla", "folder": "vanilla", "isPublic": true },
                { "name": "Modded", "directory": "modded" }
            ],
            "addresses": { "25565": "mc.example.org" }
        }"#;

        let config = Config::parse_from_str(config_str).unwrap();

        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].name, "Vanilla");
        assert_eq!(config.servers[0].directory, PathBuf::from("vanilla"));
        assert!(config.servers[0].public);
        assert!(!config.servers[1].public);
        assert!(config.is_administrator("42"));
        assert!(!config.is_administrator("43"));
        assert_eq!(config.status.addresses["25565"], "mc.example.org");
        assert_eq!(config.status.probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.supervisor.restart.max_attempts, None);
    }

    #[test]
    fn test_server_directory_uses_root_for_relative_paths() {
        let mut config = Config::with_servers(vec![
            ServerConfig {
                name: "a".to_string(),
                directory: "a".into(),
                public: true,
            },
            ServerConfig {
                name: "b".to_string(),
                directory: "/abs/b".into(),
                public: true,
            },
        ]);
        config.servers_root = Some("/srv/mc".into());

        assert_eq!(
            config.server_directory(&config.servers[0]),
            PathBuf::from("/srv/mc/a")
        );
        assert_eq!(
            config.server_directory(&config.servers[1]),
            PathBuf::from("/abs/b")
        );
    }
}
