use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU16;

/// Runtime state of a managed server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeState {
    /// No process exists
    Stopped,
    /// Process spawned, ready marker not seen yet
    Starting,
    /// Process is accepting commands
    Running,
    /// Shutdown command sent, waiting for the process to exit
    Stopping,
}

impl RuntimeState {
    /// Whether a process handle must exist in this state.
    pub fn is_active(self) -> bool {
        !matches!(self, RuntimeState::Stopped)
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RuntimeState::Stopped => "stopped",
            RuntimeState::Starting => "starting",
            RuntimeState::Running => "running",
            RuntimeState::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Port a server listens on, as declared in its `server.properties`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Port {
    /// The server has never run, so its settings file does not exist yet
    Uninitialized,
    /// The `server-port` value
    Assigned(NonZeroU16),
}

impl Port {
    pub fn number(self) -> Option<u16> {
        match self {
            Port::Uninitialized => None,
            Port::Assigned(port) => Some(port.get()),
        }
    }

    pub fn is_initialized(self) -> bool {
        matches!(self, Port::Assigned(_))
    }
}

impl From<NonZeroU16> for Port {
    fn from(port: NonZeroU16) -> Self {
        Port::Assigned(port)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Uninitialized => f.write_str("uninitialized"),
            Port::Assigned(port) => write!(f, "{}", port),
        }
    }
}

/// Point-in-time view of one server, published by its supervisor after every
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSnapshot {
    pub state: RuntimeState,
    pub port: Port,
    /// Whether the supervisor currently owns a process handle
    pub has_process: bool,
}

impl ServerSnapshot {
    pub(crate) fn stopped(port: Port) -> Self {
        Self {
            state: RuntimeState::Stopped,
            port,
            has_process: false,
        }
    }
}
