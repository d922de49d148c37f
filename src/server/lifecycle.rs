use crate::server::RuntimeState;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::broadcast;

/// Maximum number of events kept per server
const MAX_HISTORY: usize = 1000;

/// One state transition of a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// Server name
    pub server: String,
    /// State before the transition
    pub from: RuntimeState,
    /// State after the transition
    pub to: RuntimeState,
    /// Event timestamp
    pub timestamp: Instant,
}

/// Bounded transition history of one server, plus a live feed of new entries.
#[derive(Clone)]
pub struct EventLog {
    events: Arc<Mutex<VecDeque<ServerEvent>>>,
    feed: broadcast::Sender<ServerEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(64);
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            feed,
        }
    }

    /// Record a transition
    pub fn record(&self, server: &str, from: RuntimeState, to: RuntimeState) {
        let event = ServerEvent {
            server: server.to_string(),
            from,
            to,
            timestamp: Instant::now(),
        };

        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push_back(event.clone());
        while events.len() > MAX_HISTORY {
            events.pop_front();
        }
        drop(events);

        // No subscribers is fine
        let _ = self.feed.send(event);
    }

    /// Get recent events, newest first
    pub fn recent(&self, limit: Option<usize>) -> Vec<ServerEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let limit = limit.unwrap_or(events.len());
        events.iter().rev().take(limit).cloned().collect()
    }

    /// Subscribe to transitions recorded from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.feed.subscribe()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
