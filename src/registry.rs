//! The set of managed servers.

use crate::config::{Config, ServerConfig, SupervisorConfig};
use crate::server::{ServerRecord, ServerSupervisor};

/// All servers that loaded successfully, in configuration order.
#[derive(Clone)]
pub struct ServerRegistry {
    servers: Vec<ServerSupervisor>,
}

impl ServerRegistry {
    /// Load every server of `config`, resolving relative directories against
    /// `serversRoot`. Must be called inside a tokio runtime.
    pub fn from_config(config: &Config) -> Self {
        let servers = config.servers.iter().map(|server| ServerConfig {
            directory: config.server_directory(server),
            ..server.clone()
        });
        Self::load(servers, &config.supervisor)
    }

    /// Load servers one by one. A server that fails to load is logged and left
    /// out; it never prevents the others from loading.
    #[tracing::instrument(skip_all)]
    pub fn load(
        configs: impl IntoIterator<Item = ServerConfig>,
        options: &SupervisorConfig,
    ) -> Self {
        let mut servers = Vec::new();

        for config in configs {
            let name = config.name.clone();
            match ServerRecord::load(config) {
                Ok(record) => {
                    tracing::info!(server = %name, port = %record.port(), "Loaded server");
                    servers.push(ServerSupervisor::spawn(record, options.clone()));
                }
                Err(e) => {
                    tracing::error!(server = %name, error = %e, "Skipping server");
                }
            }
        }

        Self { servers }
    }

    /// Find a server by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&ServerSupervisor> {
        let wanted = name.to_lowercase();
        self.servers
            .iter()
            .find(|server| server.name().to_lowercase() == wanted)
    }

    /// Servers in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &ServerSupervisor> {
        self.servers.iter()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
