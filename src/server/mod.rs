/// Server management module for MC Runner.
///
/// This module owns the lifecycle of each managed server process: reading its
/// settings, spawning it, watching its output for readiness, reacting to its
/// exit and shutting it down.
///
/// # Components
///
/// * `state` - Runtime state, port and snapshot types
/// * `settings` - Port lookup in `server.properties`
/// * `process` - Process spawning and watcher tasks
/// * `supervisor` - The per-server state machine and its handle
/// * `lifecycle` - Transition history and live feed
///
/// # Examples
///
/// Supervising a single server without admission policy:
///
/// ```no_run
/// use mc_runner::config::{ServerConfig, SupervisorConfig};
/// use mc_runner::server::{RuntimeState, ServerRecord, ServerSupervisor};
///
/// #[tokio::main]
/// async fn main() -> mc_runner::Result<()> {
///     let record = ServerRecord::load(ServerConfig {
///         name: "Survival".to_string(),
///         directory: "/srv/mc/survival".into(),
///         public: true,
///     })?;
///     let server = ServerSupervisor::spawn(record, SupervisorConfig::default());
///
///     if server.start().await.is_started() {
///         assert_eq!(server.state(), RuntimeState::Running);
///         server.stop().await;
///     }
///     Ok(())
/// }
/// ```
pub mod lifecycle;
mod process;
pub mod settings;
mod state;
mod supervisor;

pub use lifecycle::{EventLog, ServerEvent};
pub use process::RunId;
pub use state::{Port, RuntimeState, ServerSnapshot};
pub use supervisor::{ServerRecord, ServerSupervisor, StartOutcome, StopOutcome};
