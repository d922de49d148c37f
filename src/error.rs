/// Error handling module for MC Runner.
///
/// This module defines the error types used throughout the library.
/// Errors never cross the [`McRunner`](crate::McRunner) boundary directly:
/// operations report [`StartOutcome`](crate::StartOutcome) and
/// [`StopOutcome`](crate::StopOutcome), and the errors below are logged and
/// translated on the way out. Policy decisions (authorization, concurrency cap,
/// port conflicts) are not errors at all, see [`Rejection`](crate::Rejection).
///
/// # Example
///
/// ```
/// use mc_runner::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::ConfigInvalid(msg)) => println!("Fix the configuration: {}", msg),
///         Err(Error::Settings(msg)) => println!("Bad server.properties: {}", msg),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use thiserror::Error;

/// Errors that can occur in the mc-runner library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse configuration from a file or string.
    ///
    /// This error occurs when:
    /// - The configuration JSON or YAML is malformed
    /// - Required fields are missing
    /// - Field types are incorrect
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains invalid values.
    ///
    /// This error occurs when:
    /// - Two servers share a name (names are compared case-insensitively)
    /// - A server directory is missing or is not a directory
    /// - The concurrency cap or a timeout is zero
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The instance's `server.properties` exists but could not be used.
    ///
    /// This error occurs when:
    /// - The file cannot be read
    /// - The `server-port` key is missing
    /// - The `server-port` value is not a port in `1..=65535`
    #[error("Invalid server settings: {0}")]
    Settings(String),

    /// Error when spawning or signalling a server process.
    ///
    /// This error occurs when:
    /// - The entry point is missing or not executable
    /// - The shutdown command cannot be written to the process
    #[error("Server process error: {0}")]
    Process(String),

    /// The status reply could not be decoded.
    #[error("Status protocol error: {0}")]
    Protocol(String),

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Result type for mc-runner operations.
pub type Result<T> = std::result::Result<T, Error>;
