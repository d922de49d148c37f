/*!
 # MC Runner

 A Rust library for supervising a small fleet of Minecraft server processes.

 ## Overview

 MC Runner provides functionality to:
 - Start and stop server processes safely, one process per server at most
 - Detect readiness and crashes from the server's console output
 - Restart servers that crash while running
 - Refuse unsafe starts: restricted servers, too many active servers, port clashes
 - Query live status (version, player counts) of running servers

 ## Basic Usage

 ```no_run
 use mc_runner::{McRunner, StartOutcome};

 #[tokio::main]
 async fn main() -> mc_runner::Result<()> {
     // Create a runner from config file
     let runner = McRunner::from_config_file("config.json")?;

     // Start a server on behalf of a non-administrator
     match runner.start("survival", false).await {
         StartOutcome::Started => println!("Survival is up"),
         StartOutcome::Failed => println!("Survival failed to start"),
         StartOutcome::Rejected(reason) => println!("Refused: {}", reason),
     }

     // List every server with its state and port
     for server in runner.list() {
         println!("{}: {} (port {})", server.name, server.state, server.port);
     }

     // Stop everything before exiting
     runner.shutdown().await;
     Ok(())
 }
 ```

 ## Features

 - **Process Supervision**: One actor task per server owns its state and process
 - **Admission Control**: Authorization, concurrency cap and port conflict checks
 - **Configuration**: JSON or YAML config files
 - **Status Queries**: Server List Ping with a bounded timeout
 - **Async Support**: Full async/await support on tokio

 ## License

 This project is licensed under the terms in the LICENSE file.
*/

pub mod admission;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod status;

pub use admission::{AdmissionController, Rejection};
pub use config::Config;
pub use error::{Error, Result};
pub use registry::ServerRegistry;
pub use server::{
    Port, RuntimeState, ServerEvent, ServerSupervisor, StartOutcome, StopOutcome,
};
pub use status::{SlpProbe, StatusProbe, StatusReport};

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// What the command layer shows about one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerDescription {
    pub name: String,
    pub state: RuntimeState,
    pub port: Port,
    pub public: bool,
    /// Address players connect to, when it is known
    pub address: Option<String>,
}

/// Configure and supervise Minecraft servers
///
/// This struct is the main entry point for the command layer: it owns the
/// registry of servers, the admission policy and the status probe.
/// All public methods are instrumented with `tracing` spans.
pub struct McRunner {
    /// Configuration
    config: Config,
    /// Loaded servers
    registry: ServerRegistry,
    /// Start policy
    admission: AdmissionController,
    /// Live status source
    probe: Arc<dyn StatusProbe>,
}

impl McRunner {
    /// Create a new runner from a configuration file path
    ///
    /// Must be called inside a tokio runtime.
    #[tracing::instrument(skip(path), fields(config_path = ?path.as_ref()))]
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Loading configuration from file");
        let config = Config::from_file(path)?;
        Self::new(config)
    }

    /// Create a new runner from a JSON configuration string
    #[tracing::instrument(skip(config))]
    pub fn from_config_str(config: &str) -> Result<Self> {
        tracing::info!("Loading configuration from string");
        let config = Config::parse_from_str(config)?;
        Self::new(config)
    }

    /// Create a new runner from a configuration
    ///
    /// Servers whose directory or settings are invalid are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if the configuration fails validation.
    #[tracing::instrument(skip(config), fields(num_servers = config.servers.len()))]
    pub fn new(config: Config) -> Result<Self> {
        config::validate_config(&config)?;

        let registry = ServerRegistry::from_config(&config);
        let admission = AdmissionController::new(config.max_running_public);
        let probe = Arc::new(SlpProbe::new(config.status.probe_timeout()));

        tracing::info!(loaded = registry.len(), "Created McRunner");
        Ok(Self {
            config,
            registry,
            admission,
            probe,
        })
    }

    /// Replace the status probe
    pub fn with_probe(mut self, probe: impl StatusProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Whether `user_id` is a configured administrator
    pub fn is_administrator(&self, user_id: &str) -> bool {
        self.config.is_administrator(user_id)
    }

    /// Start a server if admission policy allows it, and wait until it is
    /// ready or has failed.
    #[tracing::instrument(skip(self), fields(server_name = %name))]
    pub async fn start(&self, name: &str, requester_is_admin: bool) -> StartOutcome {
        let outcome = self
            .admission
            .start(&self.registry, name, requester_is_admin)
            .await;
        tracing::info!(?outcome, "Start request finished");
        outcome
    }

    /// Start a server on behalf of `user_id`
    pub async fn start_as(&self, name: &str, user_id: &str) -> StartOutcome {
        self.start(name, self.is_administrator(user_id)).await
    }

    /// Stop a running server and wait for it to exit
    #[tracing::instrument(skip(self), fields(server_name = %name))]
    pub async fn stop(&self, name: &str) -> StopOutcome {
        let Some(server) = self.registry.get(name) else {
            tracing::warn!("Stop requested for unknown server");
            return StopOutcome::Rejected(Rejection::UnknownServer(name.to_string()));
        };

        let outcome = server.stop().await;
        tracing::info!(?outcome, "Stop request finished");
        outcome
    }

    /// Current state of a server
    pub fn state(&self, name: &str) -> Option<RuntimeState> {
        self.registry.get(name).map(ServerSupervisor::state)
    }

    /// Describe a server
    pub fn describe(&self, name: &str) -> Option<ServerDescription> {
        self.registry.get(name).map(|server| self.description(server))
    }

    /// Describe every server, in configuration order
    pub fn list(&self) -> Vec<ServerDescription> {
        self.registry
            .iter()
            .map(|server| self.description(server))
            .collect()
    }

    /// Live status of a running server
    ///
    /// Returns `None` when the server is unknown, not running or has no port
    /// yet. Probe failures yield a report with every field unknown.
    #[tracing::instrument(skip(self), fields(server_name = %name))]
    pub async fn probe(&self, name: &str) -> Option<StatusReport> {
        let server = self.registry.get(name)?;
        self.probe_server(server).await
    }

    /// Describe every server, with live status for the running ones
    #[tracing::instrument(skip(self))]
    pub async fn list_with_status(&self) -> Vec<(ServerDescription, Option<StatusReport>)> {
        let mut listing = Vec::with_capacity(self.registry.len());
        for server in self.registry.iter() {
            let status = self.probe_server(server).await;
            listing.push((self.description(server), status));
        }
        listing
    }

    /// Recent state transitions of a server, newest first
    pub fn events(&self, name: &str, limit: Option<usize>) -> Option<Vec<ServerEvent>> {
        self.registry.get(name).map(|server| server.events(limit))
    }

    /// Subscribe to a server's state transitions
    pub fn subscribe(&self, name: &str) -> Option<broadcast::Receiver<ServerEvent>> {
        self.registry.get(name).map(ServerSupervisor::subscribe)
    }

    /// Bring every server down and wait until all of them have exited
    ///
    /// Running servers receive the shutdown command, starting ones are killed.
    /// Afterwards every start request is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down all servers");

        let outcomes =
            futures::future::join_all(self.registry.iter().map(ServerSupervisor::shutdown)).await;

        let failed = outcomes
            .iter()
            .filter(|outcome| !outcome.is_stopped())
            .count();
        if failed == 0 {
            tracing::info!("All servers stopped");
        } else {
            tracing::warn!(failed, "Some servers did not report a clean stop");
        }
    }

    async fn probe_server(&self, server: &ServerSupervisor) -> Option<StatusReport> {
        let snapshot = server.snapshot();
        if snapshot.state != RuntimeState::Running {
            return None;
        }
        let port = snapshot.port.number()?;
        Some(self.probe.probe(&self.config.status.status_host, port).await)
    }

    fn description(&self, server: &ServerSupervisor) -> ServerDescription {
        let snapshot = server.snapshot();
        ServerDescription {
            name: server.name().to_string(),
            state: snapshot.state,
            port: snapshot.port,
            public: server.is_public(),
            address: self.address(snapshot.port),
        }
    }

    fn address(&self, port: Port) -> Option<String> {
        let port = port.number()?;
        let status = &self.config.status;
        status
            .addresses
            .get(&port.to_string())
            .cloned()
            .or_else(|| status.public_host.as_ref().map(|host| format!("{}:{}", host, port)))
    }
}
