//! Cross-server admission policy for start requests.

use crate::registry::ServerRegistry;
use crate::server::{settings, Port, RuntimeState, ServerSupervisor, StartOutcome};
use thiserror::Error;
use tokio::sync::Mutex;

/// Why a request was refused.
///
/// Rejections are an expected outcome of a request, not a failure of the
/// system; the `Display` text is meant for end users.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A restricted server was requested by a non-administrator
    #[error("forbidden")]
    Forbidden,
    /// Start requested while the server is not stopped
    #[error("not stopped")]
    NotStopped,
    /// Stop requested while the server is not running
    #[error("not running")]
    NotRunning,
    /// The cap on active public servers is reached
    #[error("too many running")]
    TooManyRunning,
    /// Another active server is configured with the same port
    #[error("address already in use by {0}")]
    AddressInUse(String),
    /// No server has this name
    #[error("no server named \"{0}\"")]
    UnknownServer(String),
    /// The system is shutting down
    #[error("shutting down")]
    ShuttingDown,
}

/// What admission needs to know about one server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub name: &'a str,
    pub public: bool,
    pub state: RuntimeState,
    pub port: Port,
}

impl<'a> Candidate<'a> {
    pub fn of(server: &'a ServerSupervisor) -> Self {
        let snapshot = server.snapshot();
        Self {
            name: server.name(),
            public: server.is_public(),
            state: snapshot.state,
            port: snapshot.port,
        }
    }
}

/// Decide whether `target` may start, given every server (the target included).
///
/// Checks run in order and the first failure wins: authorization, target
/// state, public concurrency cap, port conflict.
pub fn evaluate(
    target: &Candidate<'_>,
    servers: &[Candidate<'_>],
    requester_is_admin: bool,
    max_running_public: usize,
) -> Result<(), Rejection> {
    if !target.public && !requester_is_admin {
        return Err(Rejection::Forbidden);
    }

    if target.state != RuntimeState::Stopped {
        return Err(Rejection::NotStopped);
    }

    let active_public = servers
        .iter()
        .filter(|server| server.public && server.state != RuntimeState::Stopped)
        .count();
    if active_public >= max_running_public {
        return Err(Rejection::TooManyRunning);
    }

    if target.port.is_initialized() {
        let conflict = servers.iter().find(|other| {
            other.name != target.name
                && other.port.is_initialized()
                && other.state != RuntimeState::Stopped
                && other.port == target.port
        });
        if let Some(other) = conflict {
            return Err(Rejection::AddressInUse(other.name.to_string()));
        }
    }

    Ok(())
}

/// Serializes start decisions across all servers.
///
/// The gate is held from the snapshot until the target has entered
/// `Starting`, so two concurrent requests can never both pass the cap or the
/// port check on the same stale view. It is released before waiting for the
/// server to become ready.
pub struct AdmissionController {
    max_running_public: usize,
    gate: Mutex<()>,
}

impl AdmissionController {
    pub fn new(max_running_public: usize) -> Self {
        Self {
            max_running_public,
            gate: Mutex::new(()),
        }
    }

    pub fn max_running_public(&self) -> usize {
        self.max_running_public
    }

    /// Evaluate a start request and, if admitted, start the server and wait
    /// for the outcome.
    #[tracing::instrument(skip(self, registry), fields(server = %name))]
    pub async fn start(
        &self,
        registry: &ServerRegistry,
        name: &str,
        requester_is_admin: bool,
    ) -> StartOutcome {
        let ack = {
            let _gate = self.gate.lock().await;

            let Some(target) = registry.get(name) else {
                return StartOutcome::Rejected(Rejection::UnknownServer(name.to_string()));
            };

            let servers: Vec<Candidate<'_>> = registry.iter().map(Candidate::of).collect();
            let mut candidate = Candidate::of(target);
            // Judge the port the server is about to bind, not the one from its last run
            if let Ok(port) = settings::read_port(target.directory()) {
                candidate.port = port;
            }

            if let Err(rejection) = evaluate(
                &candidate,
                &servers,
                requester_is_admin,
                self.max_running_public,
            ) {
                tracing::info!(%rejection, "Start request rejected");
                return StartOutcome::Rejected(rejection);
            }

            target.begin_start().await
        };

        ack.outcome().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU16;

    fn port(n: u16) -> Port {
        Port::Assigned(NonZeroU16::new(n).unwrap())
    }

    fn server(name: &str, public: bool, state: RuntimeState, port: Port) -> Candidate<'_> {
        Candidate {
            name,
            public,
            state,
            port,
        }
    }

    #[test]
    fn test_admits_stopped_public_server() {
        let a = server("a", true, RuntimeState::Stopped, port(25565));
        assert_eq!(evaluate(&a, &[a], false, 2), Ok(()));
    }

    #[test]
    fn test_restricted_server_requires_admin() {
        let a = server("a", false, RuntimeState::Stopped, port(25565));
        assert_eq!(evaluate(&a, &[a], false, 2), Err(Rejection::Forbidden));
        assert_eq!(evaluate(&a, &[a], true, 2), Ok(()));
    }

    #[test]
    fn test_target_must_be_stopped() {
        for state in [RuntimeState::Starting, RuntimeState::Running, RuntimeState::Stopping] {
            let a = server("a", true, state, port(25565));
            assert_eq!(evaluate(&a, &[a], true, 2), Err(Rejection::NotStopped));
        }
    }

    #[test]
    fn test_cap_counts_only_active_public_servers() {
        let a = server("a", true, RuntimeState::Running, port(25565));
        let b = server("b", true, RuntimeState::Starting, port(25566));
        let c = server("c", true, RuntimeState::Stopped, port(25567));
        let d = server("d", false, RuntimeState::Stopped, port(25568));
        let all = [a, b, c, d];

        assert_eq!(evaluate(&c, &all, false, 2), Err(Rejection::TooManyRunning));
        // Authorization is checked before the cap
        assert_eq!(evaluate(&d, &all, false, 2), Err(Rejection::Forbidden));
        // Administrators are still bound by the cap
        assert_eq!(evaluate(&d, &all, true, 2), Err(Rejection::TooManyRunning));

        let restricted_running = server("b", false, RuntimeState::Running, port(25566));
        assert_eq!(evaluate(&c, &[a, restricted_running, c], false, 2), Ok(()));
    }

    #[test]
    fn test_port_conflict_names_the_other_server() {
        let a = server("Survival", true, RuntimeState::Running, port(25565));
        let b = server("Creative", true, RuntimeState::Stopped, port(25565));

        assert_eq!(
            evaluate(&b, &[a, b], false, 2),
            Err(Rejection::AddressInUse("Survival".to_string()))
        );
        assert_eq!(
            Rejection::AddressInUse("Survival".to_string()).to_string(),
            "address already in use by Survival"
        );
    }

    #[test]
    fn test_port_conflict_ignores_stopped_and_uninitialized_servers() {
        let stopped = server("a", true, RuntimeState::Stopped, port(25565));
        let fresh = server("b", true, RuntimeState::Running, Port::Uninitialized);
        let target = server("c", true, RuntimeState::Stopped, port(25565));
        assert_eq!(evaluate(&target, &[stopped, fresh, target], false, 3), Ok(()));

        let uninitialized_target = server("d", true, RuntimeState::Stopped, Port::Uninitialized);
        let running = server("e", true, RuntimeState::Running, port(25565));
        assert_eq!(
            evaluate(&uninitialized_target, &[running, uninitialized_target], false, 3),
            Ok(())
        );
    }
}
