//! Live status queries against running servers.
//!
//! Status is best effort: a probe never fails, it reports
//! [`StatusReport::unknown`] instead, and callers treat missing fields as
//! "unavailable".
//!
//! # Examples
//!
//! ```no_run
//! use mc_runner::status::{SlpProbe, StatusProbe};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let probe = SlpProbe::new(Duration::from_secs(2));
//!     let report = probe.probe("127.0.0.1", 25565).await;
//!     match (report.online, report.max) {
//!         (Some(online), Some(max)) => println!("{}/{} players", online, max),
//!         _ => println!("status unavailable"),
//!     }
//! }
//! ```
pub mod codec;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Live metadata reported by a server. Every field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Version name, e.g. `1.21.4` or `Paper 1.21.4`
    pub version: Option<String>,
    /// Players currently connected
    pub online: Option<u32>,
    /// Player slots
    pub max: Option<u32>,
    /// Names of some connected players
    pub sample: Option<Vec<String>>,
}

impl StatusReport {
    /// A report with every field unknown
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::default()
    }
}

/// Queries a server's live status.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Query `host:port`. Implementations return [`StatusReport::unknown`]
    /// instead of failing.
    async fn probe(&self, host: &str, port: u16) -> StatusReport;
}

/// Server List Ping probe, the exchange the Minecraft multiplayer screen uses.
#[derive(Debug, Clone)]
pub struct SlpProbe {
    timeout: Duration,
}

impl SlpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run the exchange, surfacing what went wrong.
    pub async fn query(&self, host: &str, port: u16) -> Result<StatusReport> {
        tokio::time::timeout(self.timeout, exchange(host, port))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "No status from {}:{} within {:?}",
                    host, port, self.timeout
                ))
            })?
    }
}

#[async_trait]
impl StatusProbe for SlpProbe {
    #[tracing::instrument(skip(self))]
    async fn probe(&self, host: &str, port: u16) -> StatusReport {
        match self.query(host, port).await {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!(error = %e, "Status unavailable");
                StatusReport::unknown()
            }
        }
    }
}

async fn exchange(host: &str, port: u16) -> Result<StatusReport> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| Error::Protocol(format!("Failed to connect: {}", e)))?;

    let mut request = codec::handshake_packet(host, port);
    request.extend_from_slice(&codec::status_request_packet());
    stream
        .write_all(&request)
        .await
        .map_err(|e| Error::Protocol(format!("Failed to send status request: {}", e)))?;

    let (id, body) = codec::read_packet(&mut stream).await?;
    if id != codec::STATUS_RESPONSE_ID {
        return Err(Error::Protocol(format!("Unexpected packet id {:#04x}", id)));
    }

    parse_status(&codec::read_string(&body)?)
}

#[derive(Deserialize)]
struct RawStatus {
    version: Option<RawVersion>,
    players: Option<RawPlayers>,
}

#[derive(Deserialize)]
struct RawVersion {
    name: Option<String>,
}

#[derive(Deserialize)]
struct RawPlayers {
    online: Option<u32>,
    max: Option<u32>,
    sample: Option<Vec<RawPlayer>>,
}

#[derive(Deserialize)]
struct RawPlayer {
    name: String,
}

/// Decode the JSON document of a status response.
pub fn parse_status(json: &str) -> Result<StatusReport> {
    let raw: RawStatus = serde_json::from_str(json)
        .map_err(|e| Error::Protocol(format!("Malformed status JSON: {}", e)))?;

    let (online, max, sample) = match raw.players {
        Some(players) => (
            players.online,
            players.max,
            players
                .sample
                .map(|sample| sample.into_iter().map(|player| player.name).collect()),
        ),
        None => (None, None, None),
    };

    Ok(StatusReport {
        version: raw.version.and_then(|version| version.name),
        online,
        max,
        sample,
    })
}
